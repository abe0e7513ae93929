//! Lock-scoped execution of recurring jobs.
//!
//! Every instance of a fleet registers the same jobs; a distributed lock named after
//! each job decides which instance actually runs it. The pieces, leaves first:
//!
//! - [`LockProvider`] / [`LockHandle`] / [`LostSignal`]: contract of the lock backend.
//! - [`NonConcurrentExecutor`]: acquires one lock, runs the body on an interval while
//!   the lock is held, unwinds on shutdown or lock loss.
//! - [`JobSupervisor`]: start/stop lifecycle and the forever-retry loop around the executor.
//! - [`JobLauncher`]: the explicit list of jobs a host runs.
//!
//! ```text
//! JobSupervisor::start ─► outer loop ─► NonConcurrentExecutor::run
//!                                          ├─ LockProvider::acquire (retry every 5s)
//!                                          └─ JobBody::execute every 60s while held
//!                         ◄── returns ───── on shutdown / lock lost / error
//!            wait 60s, run again
//! ```

pub mod error;
pub use error::{JobError, LockError, SupervisorError};

pub mod lock;
pub use lock::{LockHandle, LockProvider, LostSignal, MemoryLockProvider};

pub mod signal;
pub use signal::{MergedSignal, try_wait};

pub mod telemetry;
pub use telemetry::{FanoutTelemetry, NoopTelemetry, TelemetrySink};

pub mod job;
pub use job::{JobBody, JobFn, TaskJob};

pub mod executor;
pub use executor::{NonConcurrentExecutor, RunOutcome};

pub mod supervisor;
pub use supervisor::JobSupervisor;

pub mod launcher;
pub use launcher::JobLauncher;

mod system;
pub use system::instance_id;

mod util;

pub use sole_model::*;
