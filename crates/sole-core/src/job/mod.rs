use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use taskvisor::{TaskError, TaskRef};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::JobError;

/// The work a job performs while its lock is held.
///
/// `cancel` fires on shutdown or when the lock is lost; long-running bodies should
/// check it cooperatively. An error ends the current executor run; the supervisor
/// logs it and restarts the cycle after its backoff.
#[async_trait]
pub trait JobBody: Send + Sync + 'static {
    async fn execute(&self, cancel: CancellationToken) -> Result<(), JobError>;
}

#[async_trait]
impl<B> JobBody for Arc<B>
where
    B: JobBody + ?Sized,
{
    async fn execute(&self, cancel: CancellationToken) -> Result<(), JobError> {
        (**self).execute(cancel).await
    }
}

/// Job body backed by an async closure.
pub struct JobFn<F> {
    f: F,
}

impl<F, Fut> JobFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> JobBody for JobFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    async fn execute(&self, cancel: CancellationToken) -> Result<(), JobError> {
        (self.f)(cancel).await
    }
}

/// Runs a taskvisor task as a job body.
///
/// `TaskError::Canceled` counts as a cooperative stop; any other task error fails the run.
pub struct TaskJob {
    task: TaskRef,
}

impl TaskJob {
    pub fn new(task: TaskRef) -> Self {
        Self { task }
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }
}

#[async_trait]
impl JobBody for TaskJob {
    async fn execute(&self, cancel: CancellationToken) -> Result<(), JobError> {
        match self.task.spawn(cancel).await {
            Ok(()) => Ok(()),
            Err(TaskError::Canceled) => {
                trace!(task = self.task.name(), "task observed cancellation");
                Ok(())
            }
            Err(e) => Err(JobError::fail(e.to_string())),
        }
    }
}
