//! Process-wide `tracing` subscriber setup.
//!
//! Call [`logger_init`] once, early in `main`; a second call returns
//! [`LoggerError::AlreadyInitialized`].

mod config;
mod error;
mod format;
mod level;
mod log;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use format::LoggerFormat;
pub use level::LoggerLevel;

pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    log::install(cfg)?;
    tracing::debug!(
        format = %cfg.format,
        level = cfg.level.as_str(),
        instance = sole_core::instance_id(),
        "logger installed"
    );
    Ok(())
}
