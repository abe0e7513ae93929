//! Lock-scoped execution of a single job.
//!
//! One call to [`NonConcurrentExecutor::run`] is one acquisition: wait for the lock
//! (retrying failed attempts), run the body on a fixed interval while the lock is
//! held, then unwind on shutdown or lock loss and release.
//!
//! For every successful acquisition exactly one of `ReleasedLock` or `LostLock` is
//! emitted after `AcquiredLock`.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;

use sole_model::{JobName, RetryPolicy, StopSource, TelemetryEvent};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{JobError, LockError},
    job::JobBody,
    lock::{LockHandle, LockProvider, LostSignal},
    signal::{MergedSignal, try_wait},
    system::instance_id,
    telemetry::TelemetrySink,
};

/// How a run ended when the body did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Shutdown was requested (or the backend gave up) before the lock was acquired.
    NotAcquired,
    /// The lock was held and the loop stopped because of `StopSource`.
    Stopped(StopSource),
}

pub struct NonConcurrentExecutor {
    job: JobName,
    lock_name: String,
    provider: Arc<dyn LockProvider>,
    telemetry: Arc<dyn TelemetrySink>,
    policy: RetryPolicy,
}

impl NonConcurrentExecutor {
    /// Executor whose lock name equals the job name.
    pub fn new(
        job: JobName,
        provider: Arc<dyn LockProvider>,
        telemetry: Arc<dyn TelemetrySink>,
        policy: RetryPolicy,
    ) -> Self {
        let lock_name = job.to_string();
        Self {
            job,
            lock_name,
            provider,
            telemetry,
            policy,
        }
    }

    pub fn with_lock_name(mut self, lock_name: impl Into<String>) -> Self {
        self.lock_name = lock_name.into();
        self
    }

    pub fn job(&self) -> &JobName {
        &self.job
    }

    pub fn lock_name(&self) -> &str {
        &self.lock_name
    }

    /// Acquires the lock, runs `body` every `run_interval` while it is held and
    /// releases it on the way out.
    ///
    /// Errors from `body` are returned after the lock has been cleaned up.
    pub async fn run(
        &self,
        body: &dyn JobBody,
        shutdown: &CancellationToken,
    ) -> Result<RunOutcome, JobError> {
        let Some(handle) = self.acquire(shutdown).await else {
            return Ok(RunOutcome::NotAcquired);
        };

        info!(
            job = %self.job,
            lock = %self.lock_name,
            instance = instance_id(),
            "acquired lock"
        );
        self.telemetry.track(&TelemetryEvent::AcquiredLock {
            job: self.job.clone(),
        });

        let lost = handle.lost_signal();
        let merged = MergedSignal::merge(shutdown, &lost);
        let observer =
            LostObserver::register(&lost, self.job.clone(), Arc::clone(&self.telemetry));

        if !lost.is_supported() {
            warn!(
                job = %self.job,
                lock = %self.lock_name,
                "lock backend does not support lost handle detection"
            );
        }

        let result = if merged.is_fired() {
            Ok(())
        } else {
            AssertUnwindSafe(self.hold(body, &merged))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let msg = panic_message(panic.as_ref());
                    error!(job = %self.job, panic = %msg, "job body panicked");
                    Err(JobError::Panicked(msg))
                })
        };

        self.finish(handle.as_ref(), &lost, observer).await;

        result?;
        let source = merged.source().unwrap_or(StopSource::Shutdown);
        match source {
            StopSource::Shutdown => info!(
                job = %self.job,
                "cancellation requested, leaving lock-held loop"
            ),
            StopSource::LockLost => warn!(
                job = %self.job,
                "lock lost, leaving lock-held loop"
            ),
        }
        Ok(RunOutcome::Stopped(source))
    }

    /// Waits for the lock until it is granted, the retry loop is told to stop, or
    /// `shutdown` fires.
    async fn acquire(&self, shutdown: &CancellationToken) -> Option<Box<dyn LockHandle>> {
        while !shutdown.is_cancelled() {
            info!(job = %self.job, lock = %self.lock_name, "trying to acquire lock");

            match self.provider.acquire(&self.lock_name, None, shutdown).await {
                Ok(handle) => return Some(handle),
                Err(LockError::Cancelled) if shutdown.is_cancelled() => {
                    info!(job = %self.job, "cancellation requested, stop waiting for lock");
                    return None;
                }
                Err(e) => {
                    let failure = e.class();
                    error!(
                        job = %self.job,
                        lock = %self.lock_name,
                        failure = %failure,
                        error = %e,
                        "failed to acquire lock"
                    );
                    self.telemetry.track(&TelemetryEvent::FailedAcquiringLock {
                        job: self.job.clone(),
                        failure,
                    });

                    if !failure.is_retryable() {
                        return None;
                    }
                    if !try_wait(self.policy.acquire_backoff, shutdown).await {
                        info!(
                            job = %self.job,
                            "cancellation requested during acquire backoff, stop waiting for lock"
                        );
                        return None;
                    }
                }
            }
        }
        None
    }

    /// Inner loop: invoke the body, wait the interval, repeat until the merged signal fires.
    async fn hold(&self, body: &dyn JobBody, merged: &MergedSignal) -> Result<(), JobError> {
        let mut iteration: u64 = 0;
        while !merged.is_fired() {
            iteration += 1;
            debug!(job = %self.job, iteration, "executing job body");

            body.execute(merged.token().clone()).await?;

            if !try_wait(self.policy.run_interval, merged.token()).await {
                break;
            }
        }
        Ok(())
    }

    async fn finish(&self, handle: &dyn LockHandle, lost: &LostSignal, observer: LostObserver) {
        let reported = observer.unregister().await;

        if lost.is_lost() {
            if !reported {
                report_lost(&self.job, self.telemetry.as_ref());
            }
        } else {
            info!(
                job = %self.job,
                lock = %self.lock_name,
                instance = instance_id(),
                "released lock"
            );
            self.telemetry.track(&TelemetryEvent::ReleasedLock {
                job: self.job.clone(),
            });
        }

        if let Err(e) = handle.release().await {
            warn!(job = %self.job, lock = %self.lock_name, error = %e, "lock release failed");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

fn report_lost(job: &JobName, telemetry: &dyn TelemetrySink) {
    error!(job = %job, "lost lock");
    telemetry.track(&TelemetryEvent::LostLock { job: job.clone() });
}

/// Reports lock loss as soon as the backend signals it.
///
/// Only used for observability; the inner loop reacts to loss through the merged signal.
struct LostObserver {
    stop: CancellationToken,
    task: Option<JoinHandle<bool>>,
}

impl LostObserver {
    fn register(lost: &LostSignal, job: JobName, telemetry: Arc<dyn TelemetrySink>) -> Self {
        let stop = CancellationToken::new();
        let task = lost.is_supported().then(|| {
            let lost = lost.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = lost.fired() => {
                        report_lost(&job, telemetry.as_ref());
                        true
                    }
                    _ = stop.cancelled() => false,
                }
            })
        });
        Self { stop, task }
    }

    /// Stops observing. Returns `true` if the observer already reported a loss.
    async fn unregister(mut self) -> bool {
        self.stop.cancel();
        match self.task.take() {
            Some(task) => task.await.unwrap_or(false),
            None => false,
        }
    }
}

impl Drop for LostObserver {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
