use sole_core::{TelemetryEvent, TelemetrySink};
use tracing::{Level, error, info};

/// Telemetry sink that turns every event into a structured log line under the
/// `sole.telemetry` target.
///
/// The executor and supervisor already log each transition under their own
/// targets, so pairing this sink with them prints everything twice. Use it when
/// those are filtered out (`sole_core=off,sole.telemetry=info`) or when the event
/// stream is shipped somewhere else than the operational logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TracingTelemetry {
    pub fn new() -> Self {
        Self
    }
}

#[inline]
pub fn message_for(event: &TelemetryEvent) -> &'static str {
    match event {
        // lock
        TelemetryEvent::AcquiredLock { .. } => "lock acquired",
        TelemetryEvent::LostLock { .. } => "lock lost (exclusivity no longer guaranteed)",
        TelemetryEvent::ReleasedLock { .. } => "lock released",
        TelemetryEvent::FailedAcquiringLock { .. } => "failed acquiring lock",

        // lifecycle
        TelemetryEvent::JobStarted { .. } => "job supervisor started",
        TelemetryEvent::JobStopping { .. } => "job supervisor stop requested",
        TelemetryEvent::JobStopped { .. } => "job supervisor stopped",
    }
}

/// Lock loss and failed acquisitions are errors; every other event is a lifecycle
/// transition.
pub fn level_for(event: &TelemetryEvent) -> Level {
    match event {
        TelemetryEvent::LostLock { .. } | TelemetryEvent::FailedAcquiringLock { .. } => {
            Level::ERROR
        }
        _ => Level::INFO,
    }
}

impl TelemetrySink for TracingTelemetry {
    fn track(&self, event: &TelemetryEvent) {
        let msg = message_for(event);
        let props = event.properties();
        let failure_class = event.failure().map(|f| f.as_str());

        if level_for(event) == Level::ERROR {
            error!(
                target: "sole.telemetry",
                event = event.name(),
                job = %event.job(),
                failure_class,
                %props,
                "{msg}"
            );
        } else {
            info!(
                target: "sole.telemetry",
                event = event.name(),
                job = %event.job(),
                %props,
                "{msg}"
            );
        }
    }
}
