use serde::{Deserialize, Serialize};

use crate::{FailureClass, JobName, LogContext};

/// State of the lock as reported in telemetry properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    Acquired,
    Lost,
    Released,
    Failed,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Acquired => "Acquired",
            LockState::Lost => "Lost",
            LockState::Released => "Released",
            LockState::Failed => "Failed",
        }
    }
}

/// Structured lifecycle event handed to telemetry sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum TelemetryEvent {
    AcquiredLock { job: JobName },
    LostLock { job: JobName },
    ReleasedLock { job: JobName },
    FailedAcquiringLock { job: JobName, failure: FailureClass },
    JobStarted { job: JobName },
    JobStopping { job: JobName },
    JobStopped { job: JobName },
}

impl TelemetryEvent {
    /// Stable event name used by telemetry backends.
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::AcquiredLock { .. } => "AcquiredLock",
            TelemetryEvent::LostLock { .. } => "LostLock",
            TelemetryEvent::ReleasedLock { .. } => "ReleasedLock",
            TelemetryEvent::FailedAcquiringLock { .. } => "FailedAcquiringLock",
            TelemetryEvent::JobStarted { .. } => "JobStarted",
            TelemetryEvent::JobStopping { .. } => "JobStopping",
            TelemetryEvent::JobStopped { .. } => "JobStopped",
        }
    }

    pub fn job(&self) -> &JobName {
        match self {
            TelemetryEvent::AcquiredLock { job }
            | TelemetryEvent::LostLock { job }
            | TelemetryEvent::ReleasedLock { job }
            | TelemetryEvent::FailedAcquiringLock { job, .. }
            | TelemetryEvent::JobStarted { job }
            | TelemetryEvent::JobStopping { job }
            | TelemetryEvent::JobStopped { job } => job,
        }
    }

    /// Lock state carried by lock events; `None` for supervisor lifecycle events.
    pub fn lock_state(&self) -> Option<LockState> {
        match self {
            TelemetryEvent::AcquiredLock { .. } => Some(LockState::Acquired),
            TelemetryEvent::LostLock { .. } => Some(LockState::Lost),
            TelemetryEvent::ReleasedLock { .. } => Some(LockState::Released),
            TelemetryEvent::FailedAcquiringLock { .. } => Some(LockState::Failed),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<FailureClass> {
        match self {
            TelemetryEvent::FailedAcquiringLock { failure, .. } => Some(*failure),
            _ => None,
        }
    }

    /// Event properties as an ordered context: `jobName`, then `lockState` and
    /// `failureClass` when they apply.
    pub fn properties(&self) -> LogContext {
        let mut ctx = LogContext::new().with("jobName", self.job());
        if let Some(state) = self.lock_state() {
            ctx = ctx.with("lockState", state.as_str());
        }
        if let Some(failure) = self.failure() {
            ctx = ctx.with("failureClass", failure);
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobName {
        JobName::new("juan").unwrap()
    }

    #[test]
    fn names_match_event_catalogue() {
        assert_eq!(TelemetryEvent::AcquiredLock { job: job() }.name(), "AcquiredLock");
        assert_eq!(TelemetryEvent::LostLock { job: job() }.name(), "LostLock");
        assert_eq!(TelemetryEvent::ReleasedLock { job: job() }.name(), "ReleasedLock");
        assert_eq!(
            TelemetryEvent::FailedAcquiringLock {
                job: job(),
                failure: FailureClass::Unknown
            }
            .name(),
            "FailedAcquiringLock"
        );
    }

    #[test]
    fn failed_acquisition_properties() {
        let ev = TelemetryEvent::FailedAcquiringLock {
            job: job(),
            failure: FailureClass::ConnectionClosed,
        };
        let props = ev.properties();
        assert_eq!(props.get("jobName"), Some("juan"));
        assert_eq!(props.get("lockState"), Some("Failed"));
        assert_eq!(props.get("failureClass"), Some("ConnectionClosed"));
    }

    #[test]
    fn lifecycle_events_carry_only_job_name() {
        let props = TelemetryEvent::JobStopping { job: job() }.properties();
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("jobName"), Some("juan"));
    }

    #[test]
    fn serializes_with_event_tag() {
        let json = serde_json::to_value(TelemetryEvent::LostLock { job: job() }).unwrap();
        assert_eq!(json["event"], "LostLock");
        assert_eq!(json["job"], "juan");
    }
}
