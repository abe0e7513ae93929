use std::io::IsTerminal;

use serde::Deserialize;

use crate::logger::{format::LoggerFormat, level::LoggerLevel};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    pub level: LoggerLevel,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || std::io::stdout().is_terminal();
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            with_targets: true,
            use_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let cfg: LoggerConfig =
            serde_json::from_str(r#"{"format":"json","level":"sole_core=debug"}"#).unwrap();
        assert_eq!(cfg.format, LoggerFormat::Json);
        assert_eq!(cfg.level.as_str(), "sole_core=debug");
        assert!(cfg.with_targets);
    }

    #[test]
    fn invalid_level_is_rejected() {
        let cfg: Result<LoggerConfig, _> = serde_json::from_str(r#"{"level":"sole_core=loud"}"#);
        assert!(cfg.is_err());
    }
}
