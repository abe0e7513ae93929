use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Unique, stable name of a recurring job.
///
/// The name doubles as the distributed lock name, so it must be identical on every
/// instance of the fleet. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobName(Arc<str>);

impl JobName {
    pub fn new(name: impl AsRef<str>) -> Result<Self, ModelError> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(ModelError::EmptyJobName);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ModelError::InvalidJobName(name.to_string()));
        }
        Ok(Self(Arc::from(name)))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobName {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for JobName {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobName> for String {
    fn from(name: JobName) -> Self {
        name.0.to_string()
    }
}
