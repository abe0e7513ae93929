//! Shared data types for the sole job runtime.
//!
//! Nothing in here performs I/O; the types are consumed by `sole-core` and by the
//! telemetry backends.

mod domain;
pub use domain::*;

mod error;
pub use error::ModelError;
