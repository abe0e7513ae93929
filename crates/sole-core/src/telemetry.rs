//! Telemetry sink contract.
//!
//! Sinks are called synchronously from the executor, including from the lock-loss
//! observer, so `track` must not block and cannot fail.

use std::sync::Arc;

use sole_model::TelemetryEvent;

pub trait TelemetrySink: Send + Sync {
    fn track(&self, event: &TelemetryEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn track(&self, _event: &TelemetryEvent) {}
}

/// Forwards every event to each inner sink in registration order.
#[derive(Clone, Default)]
pub struct FanoutTelemetry {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanoutTelemetry {
    fn track(&self, event: &TelemetryEvent) {
        for sink in &self.sinks {
            sink.track(event);
        }
    }
}
