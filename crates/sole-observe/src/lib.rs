mod logger;
pub use logger::*;

mod telemetry;
pub use telemetry::{TracingTelemetry, level_for, message_for};
