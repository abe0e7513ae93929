use std::{sync::Arc, time::Duration};

use anyhow::Context;
use taskvisor::{TaskError, TaskFn, TaskRef};
use tokio_util::sync::CancellationToken;
use tracing::info;

use sole_core::{JobFn, JobLauncher, JobName, MemoryLockProvider, TaskJob, instance_id};
use sole_observe::{LoggerConfig, LoggerFormat, LoggerLevel, logger_init};
use sole_prometheus::PrometheusTelemetry;

const JOBS: [&str; 9] = [
    "mateo", "bautista", "juan", "felipe", "bruno", "noah", "benicio", "thiago", "ciro",
];
const DEFAULT_GRACE_MS: u64 = 30_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    let cfg = logger_config_from_env()?;
    logger_init(&cfg)?;
    info!(instance = instance_id(), "logger initialized");

    // 2) Telemetry (transitions are already logged by sole_core itself)
    let metrics = PrometheusTelemetry::new()?;

    // 3) Jobs
    let provider = Arc::new(MemoryLockProvider::new());
    let mut launcher = JobLauncher::new(provider, Arc::new(metrics.clone()));
    for name in JOBS {
        let job = JobName::new(name)?;
        let tag = job.clone();
        launcher.register(
            job,
            JobFn::new(move |_cancel: CancellationToken| {
                let tag = tag.clone();
                async move {
                    info!(job = %tag, "job executed");
                    Ok(())
                }
            }),
        )?;
    }
    launcher.register(JobName::new("liam")?, TaskJob::new(liam_task()))?;
    info!(jobs = launcher.len(), "jobs registered");

    // 4) Run until Ctrl+C
    launcher.start_all()?;
    info!("press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    // 5) Graceful shutdown
    let grace = shutdown_grace_from_env()?;
    info!(grace_ms = grace.as_millis() as u64, "shutting down...");
    launcher.stop_all(grace).await;

    for job in launcher.jobs() {
        let name = job.job().as_str();
        info!(
            job = name,
            acquired = metrics.event_count(name, "AcquiredLock"),
            released = metrics.event_count(name, "ReleasedLock"),
            lost = metrics.event_count(name, "LostLock"),
            "lock summary"
        );
    }
    Ok(())
}

fn liam_task() -> TaskRef {
    TaskFn::arc("liam", |ctx: CancellationToken| async move {
        if ctx.is_cancelled() {
            return Err(TaskError::Canceled);
        }
        info!(job = "liam", "job executed");
        Ok(())
    })
}

fn logger_config_from_env() -> anyhow::Result<LoggerConfig> {
    let mut cfg = LoggerConfig::default();
    if let Ok(level) = std::env::var("SOLE_LOG_LEVEL") {
        cfg.level = LoggerLevel::new(level)?;
    }
    if let Ok(format) = std::env::var("SOLE_LOG_FORMAT") {
        cfg.format = format.parse::<LoggerFormat>()?;
    }
    Ok(cfg)
}

fn shutdown_grace_from_env() -> anyhow::Result<Duration> {
    let ms = match std::env::var("SOLE_SHUTDOWN_GRACE_MS") {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid SOLE_SHUTDOWN_GRACE_MS: {raw}"))?,
        Err(_) => DEFAULT_GRACE_MS,
    };
    Ok(Duration::from_millis(ms))
}
