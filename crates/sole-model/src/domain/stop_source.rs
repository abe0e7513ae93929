use std::fmt;

use serde::{Deserialize, Serialize};

/// Which input of a merged cancellation signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopSource {
    /// Top-level shutdown requested by the host.
    Shutdown,
    /// The lock backend reported that exclusivity is no longer guaranteed.
    LockLost,
}

impl fmt::Display for StopSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopSource::Shutdown => f.write_str("shutdown"),
            StopSource::LockLost => f.write_str("lock lost"),
        }
    }
}
