use prometheus::{IntCounterVec, Opts, Registry, proto::MetricFamily};
use sole_core::{TelemetryEvent, TelemetrySink};
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("failed to register metric: {0}")]
    Register(#[from] prometheus::Error),
}

/// Counts telemetry events in a Prometheus registry.
///
/// Cloning shares the underlying counters.
#[derive(Clone)]
pub struct PrometheusTelemetry {
    registry: Registry,
    events: IntCounterVec,
    acquire_failures: IntCounterVec,
}

impl PrometheusTelemetry {
    /// Registers the counters in a fresh registry.
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Registry::new())
    }

    /// Registers the counters in an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let events = IntCounterVec::new(
            Opts::new("sole_lock_events_total", "Lock and job lifecycle events"),
            &["job", "event"],
        )?;
        let acquire_failures = IntCounterVec::new(
            Opts::new(
                "sole_lock_acquire_failures_total",
                "Failed lock acquisition attempts by failure class",
            ),
            &["job", "failure_class"],
        )?;

        registry.register(Box::new(events.clone()))?;
        registry.register(Box::new(acquire_failures.clone()))?;

        Ok(Self {
            registry,
            events,
            acquire_failures,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    pub fn event_count(&self, job: &str, event: &str) -> u64 {
        self.events.with_label_values(&[job, event]).get()
    }

    pub fn failure_count(&self, job: &str, failure_class: &str) -> u64 {
        self.acquire_failures
            .with_label_values(&[job, failure_class])
            .get()
    }
}

impl TelemetrySink for PrometheusTelemetry {
    fn track(&self, event: &TelemetryEvent) {
        let job = event.job().as_str();
        self.events.with_label_values(&[job, event.name()]).inc();

        if let Some(failure) = event.failure() {
            self.acquire_failures
                .with_label_values(&[job, failure.as_str()])
                .inc();
        }
        trace!(job, event = event.name(), "telemetry event counted");
    }
}
