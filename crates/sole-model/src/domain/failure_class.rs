use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a failed lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureClass {
    /// The lock backend rejected the call.
    BackendError,
    /// Transport to the backend was down.
    ConnectionClosed,
    /// Caller-requested abort; not a real failure.
    Cancelled,
    /// Anything else.
    Unknown,
}

impl FailureClass {
    /// Returns `true` if the acquisition loop should back off and try again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureClass::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::BackendError => "BackendError",
            FailureClass::ConnectionClosed => "ConnectionClosed",
            FailureClass::Cancelled => "Cancelled",
            FailureClass::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
