use sole_model::{FailureClass, JobName, ModelError};
use thiserror::Error;

/// Errors reported by a [`crate::LockProvider`] or [`crate::LockHandle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("lock backend rejected the call: {0}")]
    Backend(String),
    #[error("connection to lock backend is closed: {0}")]
    ConnectionClosed(String),
    #[error("lock acquisition cancelled")]
    Cancelled,
    #[error("timed out waiting for lock")]
    Timeout,
    #[error("lock error: {0}")]
    Other(String),
}

impl LockError {
    pub fn class(&self) -> FailureClass {
        match self {
            LockError::Backend(_) => FailureClass::BackendError,
            LockError::ConnectionClosed(_) => FailureClass::ConnectionClosed,
            LockError::Cancelled => FailureClass::Cancelled,
            LockError::Timeout | LockError::Other(_) => FailureClass::Unknown,
        }
    }
}

/// Failure of a single executor run.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("job failed: {reason}")]
    Failed { reason: String },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn fail(reason: impl Into<String>) -> Self {
        JobError::Failed {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("job {0} was stopped and cannot be started again")]
    Terminated(JobName),
    #[error("job {0} is already registered")]
    DuplicateJob(JobName),
    #[error(transparent)]
    Model(#[from] ModelError),
}
