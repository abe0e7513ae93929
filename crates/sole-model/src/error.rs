use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("job name must not be empty")]
    EmptyJobName,
    #[error("job name contains whitespace: {0:?}")]
    InvalidJobName(String),
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),
}
