mod job_name;
pub use job_name::JobName;

mod execution_state;
pub use execution_state::ExecutionState;

mod retry_policy;
pub use retry_policy::RetryPolicy;

mod failure_class;
pub use failure_class::FailureClass;

mod stop_source;
pub use stop_source::StopSource;

mod log_context;
pub use log_context::LogContext;

mod telemetry_event;
pub use telemetry_event::{LockState, TelemetryEvent};
