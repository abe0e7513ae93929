use thiserror::Error;

/// Failures while configuring or installing the process-wide subscriber.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}', expected one of text, json, journald")]
    InvalidFormat(String),
    #[error("journald output requires linux and the `journald` feature")]
    JournaldNotSupported,
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
    #[error("logger setup failed: {0}")]
    InitializationFailed(String),
    #[error("invalid log filter directive '{0}'")]
    InvalidLogLevel(String),
}
