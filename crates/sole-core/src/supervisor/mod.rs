use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use sole_model::{ExecutionState, JobName, RetryPolicy, TelemetryEvent};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::{JobError, SupervisorError},
    executor::{NonConcurrentExecutor, RunOutcome},
    job::JobBody,
    lock::LockProvider,
    signal::try_wait,
    telemetry::TelemetrySink,
    util::lock,
};

/// Owns the lifecycle of one named job.
///
/// [`start`](Self::start) launches the outer loop on the tokio runtime and returns at
/// once. The loop runs [`NonConcurrentExecutor::run`] forever: whatever the outcome
/// (lock never acquired, lock lost, body error or panic) it waits `restart_backoff` and
/// tries again, until [`stop`](Self::stop) cancels it.
pub struct JobSupervisor {
    job: JobName,
    body: Arc<dyn JobBody>,
    provider: Arc<dyn LockProvider>,
    telemetry: Arc<dyn TelemetrySink>,
    policy: RetryPolicy,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

#[derive(Default)]
struct Lifecycle {
    state: ExecutionState,
    token: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl JobSupervisor {
    pub fn new<B: JobBody>(
        job: JobName,
        body: B,
        provider: Arc<dyn LockProvider>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            job,
            body: Arc::new(body),
            provider,
            telemetry,
            policy: RetryPolicy::default(),
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
        }
    }

    /// Replaces the default timings. Zero durations are rejected.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Result<Self, SupervisorError> {
        policy.validate()?;
        self.policy = policy;
        Ok(self)
    }

    pub fn job(&self) -> &JobName {
        &self.job
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn state(&self) -> ExecutionState {
        lock(&self.lifecycle).state
    }

    /// Launches the outer loop. Must be called from within a tokio runtime.
    ///
    /// Calling it again while running is a no-op; a stopped supervisor cannot be restarted.
    #[instrument(level = "debug", skip(self), fields(job = %self.job))]
    pub fn start(&self) -> Result<(), SupervisorError> {
        let mut lc = lock(&self.lifecycle);
        match lc.state {
            ExecutionState::NotStarted => {}
            ExecutionState::Running => {
                debug!("job already running");
                return Ok(());
            }
            ExecutionState::StopRequested | ExecutionState::Stopped => {
                return Err(SupervisorError::Terminated(self.job.clone()));
            }
        }

        let token = CancellationToken::new();
        let outer = OuterLoop {
            job: self.job.clone(),
            body: Arc::clone(&self.body),
            executor: Arc::new(NonConcurrentExecutor::new(
                self.job.clone(),
                Arc::clone(&self.provider),
                Arc::clone(&self.telemetry),
                self.policy,
            )),
            restart_backoff: self.policy.restart_backoff,
            telemetry: Arc::clone(&self.telemetry),
            lifecycle: Arc::clone(&self.lifecycle),
        };

        lc.state = ExecutionState::Running;
        lc.token = Some(token.clone());
        lc.task = Some(tokio::spawn(outer.run(token)));
        drop(lc);

        info!(job = %self.job, "job started");
        self.telemetry.track(&TelemetryEvent::JobStarted {
            job: self.job.clone(),
        });
        Ok(())
    }

    /// Signals cancellation without waiting for the loop to exit.
    ///
    /// Returns `true` if this call moved the supervisor to `StopRequested`.
    pub fn request_stop(&self) -> bool {
        let mut lc = lock(&self.lifecycle);
        if lc.state != ExecutionState::Running {
            return false;
        }
        lc.state = ExecutionState::StopRequested;
        if let Some(token) = &lc.token {
            token.cancel();
        }
        drop(lc);

        info!(job = %self.job, "job is stopping");
        self.telemetry.track(&TelemetryEvent::JobStopping {
            job: self.job.clone(),
        });
        true
    }

    /// Signals cancellation and waits up to `deadline` for the loop to exit.
    ///
    /// The loop is never aborted: if the deadline elapses first this returns and the
    /// loop finishes on its own. Calling it on a stopped or never-started supervisor
    /// does nothing.
    #[instrument(level = "debug", skip(self), fields(job = %self.job))]
    pub async fn stop(&self, deadline: Duration) {
        self.request_stop();

        let task = {
            let mut lc = lock(&self.lifecycle);
            if lc.state != ExecutionState::StopRequested {
                return;
            }
            lc.task.take()
        };
        let Some(mut task) = task else {
            debug!("another caller is already waiting for the job to stop");
            return;
        };

        match tokio::time::timeout(deadline, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(job = %self.job, error = %e, "job loop terminated abnormally");
                mark_stopped(&self.lifecycle, &self.job, self.telemetry.as_ref());
            }
            Err(_) => {
                warn!(
                    job = %self.job,
                    deadline_ms = deadline.as_millis() as u64,
                    "job did not stop before the deadline"
                );
                lock(&self.lifecycle).task = Some(task);
            }
        }
    }
}

impl Drop for JobSupervisor {
    fn drop(&mut self) {
        if let Some(token) = &lock(&self.lifecycle).token {
            token.cancel();
        }
    }
}

/// Moves the lifecycle to `Stopped` once and reports it.
fn mark_stopped(lifecycle: &Mutex<Lifecycle>, job: &JobName, telemetry: &dyn TelemetrySink) {
    {
        let mut lc = lock(lifecycle);
        if lc.state == ExecutionState::Stopped {
            return;
        }
        lc.state = ExecutionState::Stopped;
        lc.token = None;
    }
    info!(job = %job, "job has stopped");
    telemetry.track(&TelemetryEvent::JobStopped { job: job.clone() });
}

struct OuterLoop {
    job: JobName,
    body: Arc<dyn JobBody>,
    executor: Arc<NonConcurrentExecutor>,
    restart_backoff: Duration,
    telemetry: Arc<dyn TelemetrySink>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl OuterLoop {
    async fn run(self, token: CancellationToken) {
        while !token.is_cancelled() {
            match self.cycle(&token).await {
                Ok(RunOutcome::NotAcquired) => {
                    debug!(job = %self.job, "executor returned without the lock")
                }
                Ok(RunOutcome::Stopped(source)) => {
                    debug!(job = %self.job, %source, "executor run finished")
                }
                Err(e) => error!(job = %self.job, error = %e, "execution pipeline failed"),
            }

            if token.is_cancelled() {
                info!(
                    job = %self.job,
                    "cancellation requested, will not restart execution pipeline"
                );
                break;
            }
            if !try_wait(self.restart_backoff, &token).await {
                info!(
                    job = %self.job,
                    wait_ms = self.restart_backoff.as_millis() as u64,
                    "cancellation requested before restart backoff elapsed, will not restart execution pipeline"
                );
                break;
            }
            info!(job = %self.job, "restarting execution pipeline");
        }

        mark_stopped(&self.lifecycle, &self.job, self.telemetry.as_ref());
    }

    /// One acquire-and-run cycle on its own task. Body panics are already caught by the
    /// executor; anything else that unwinds (a telemetry sink, a lock backend) ends the
    /// cycle, not the loop.
    async fn cycle(&self, token: &CancellationToken) -> Result<RunOutcome, JobError> {
        let executor = Arc::clone(&self.executor);
        let body = Arc::clone(&self.body);
        let token = token.clone();

        let run = tokio::spawn(async move { executor.run(body.as_ref(), &token).await });
        match run.await {
            Ok(res) => res,
            Err(e) => Err(JobError::Panicked(e.to_string())),
        }
    }
}
