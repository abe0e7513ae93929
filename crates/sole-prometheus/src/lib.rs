//! Prometheus telemetry backend for sole job supervisors.
//!
//! This crate provides [`PrometheusTelemetry`], a [`sole_core::TelemetrySink`] that
//! counts lock and lifecycle events.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use sole_core::{JobLauncher, MemoryLockProvider};
//! use sole_prometheus::PrometheusTelemetry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusTelemetry::new()?;
//! let launcher = JobLauncher::new(
//!     Arc::new(MemoryLockProvider::new()),
//!     Arc::new(metrics.clone()),
//! );
//! # let _ = launcher;
//!
//! // let families = metrics.gather();
//! // prometheus::TextEncoder::new().encode(&families, &mut buffer)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `sole_lock_events_total{job, event}` - Counter
//! - `sole_lock_acquire_failures_total{job, failure_class}` - Counter
//!
//! ## HTTP Server
//! This crate does NOT provide an HTTP server for the `/metrics` endpoint.
//! Serve [`PrometheusTelemetry::gather`] from the host's own HTTP stack.

mod backend;
pub use backend::{MetricsError, PrometheusTelemetry};

pub use prometheus::{Encoder, Registry, TextEncoder};
