use std::{collections::HashSet, sync::Arc, time::Duration};

use sole_model::{JobName, RetryPolicy};
use tokio::time::Instant;
use tracing::info;

use crate::{
    error::SupervisorError, job::JobBody, lock::LockProvider, supervisor::JobSupervisor,
    telemetry::TelemetrySink,
};

/// The explicit list of jobs a host runs.
///
/// Every registered job shares one lock provider, one telemetry sink and one retry
/// policy. This is the only place that knows about all jobs.
pub struct JobLauncher {
    provider: Arc<dyn LockProvider>,
    telemetry: Arc<dyn TelemetrySink>,
    policy: RetryPolicy,
    names: HashSet<JobName>,
    jobs: Vec<JobSupervisor>,
}

impl JobLauncher {
    pub fn new(provider: Arc<dyn LockProvider>, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            provider,
            telemetry,
            policy: RetryPolicy::default(),
            names: HashSet::new(),
            jobs: Vec::new(),
        }
    }

    /// Policy for jobs registered after this call.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Result<Self, SupervisorError> {
        policy.validate()?;
        self.policy = policy;
        Ok(self)
    }

    pub fn register<B: JobBody>(
        &mut self,
        name: JobName,
        body: B,
    ) -> Result<&mut Self, SupervisorError> {
        if self.names.contains(&name) {
            return Err(SupervisorError::DuplicateJob(name));
        }
        let sup = JobSupervisor::new(
            name.clone(),
            body,
            Arc::clone(&self.provider),
            Arc::clone(&self.telemetry),
        )
        .with_policy(self.policy)?;
        self.names.insert(name);
        self.jobs.push(sup);
        Ok(self)
    }

    pub fn jobs(&self) -> &[JobSupervisor] {
        &self.jobs
    }

    pub fn get(&self, name: &str) -> Option<&JobSupervisor> {
        self.jobs.iter().find(|j| j.job().as_str() == name)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn start_all(&self) -> Result<(), SupervisorError> {
        for job in &self.jobs {
            job.start()?;
        }
        info!(jobs = self.jobs.len(), "all jobs started");
        Ok(())
    }

    /// Signals every job first, then waits for each within what is left of `deadline`.
    pub async fn stop_all(&self, deadline: Duration) {
        for job in &self.jobs {
            job.request_stop();
        }
        let until = Instant::now() + deadline;
        for job in &self.jobs {
            job.stop(until.saturating_duration_since(Instant::now())).await;
        }
        let stopped = self
            .jobs
            .iter()
            .filter(|j| j.state().is_terminal())
            .count();
        info!(jobs = self.jobs.len(), stopped, "job shutdown finished");
    }
}
