use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use sole_core::{
    ExecutionState, FailureClass, JobBody, JobError, JobFn, JobName, JobSupervisor, LockError,
    LockHandle, LockProvider, MemoryLockProvider, NonConcurrentExecutor, RetryPolicy, RunOutcome,
    StopSource, TelemetryEvent, TelemetrySink,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Recorder(Mutex<Vec<TelemetryEvent>>);

impl Recorder {
    fn events(&self) -> Vec<TelemetryEvent> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl TelemetrySink for Recorder {
    fn track(&self, event: &TelemetryEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

struct FailThenGrant {
    remaining: AtomicUsize,
    inner: MemoryLockProvider,
}

#[async_trait]
impl LockProvider for FailThenGrant {
    async fn acquire(
        &self,
        name: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn LockHandle>, LockError> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left > 0 {
            self.remaining.store(left - 1, Ordering::SeqCst);
            return Err(LockError::Backend("lock request timed out on server".into()));
        }
        self.inner.acquire(name, timeout, cancel).await
    }
}

fn job(name: &str) -> JobName {
    JobName::new(name).unwrap()
}

#[tokio::test(start_paused = true)]
async fn backend_errors_then_single_run_then_cancel() {
    let sink = Arc::new(Recorder::default());
    let provider = Arc::new(FailThenGrant {
        remaining: AtomicUsize::new(2),
        inner: MemoryLockProvider::new(),
    });
    let exec = NonConcurrentExecutor::new(
        job("mateo"),
        provider,
        sink.clone(),
        RetryPolicy::default(),
    );

    let shutdown = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let body = {
        let calls = Arc::clone(&calls);
        let shutdown = shutdown.clone();
        JobFn::new(move |_cancel| {
            calls.fetch_add(1, Ordering::SeqCst);
            shutdown.cancel();
            async { Ok(()) }
        })
    };

    let outcome = exec.run(&body, &shutdown).await.unwrap();

    assert_eq!(outcome, RunOutcome::Stopped(StopSource::Shutdown));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let events = sink.events();
    let names: Vec<_> = events.iter().map(TelemetryEvent::name).collect();
    assert_eq!(
        names,
        vec![
            "FailedAcquiringLock",
            "FailedAcquiringLock",
            "AcquiredLock",
            "ReleasedLock"
        ]
    );
    assert!(
        events
            .iter()
            .filter_map(TelemetryEvent::failure)
            .all(|f| f == FailureClass::BackendError)
    );
}

#[tokio::test(start_paused = true)]
async fn lock_lost_between_runs() {
    let sink = Arc::new(Recorder::default());
    let provider = Arc::new(MemoryLockProvider::new());
    let exec = NonConcurrentExecutor::new(
        job("bautista"),
        provider.clone(),
        sink.clone(),
        RetryPolicy::default(),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let body = {
        let calls = Arc::clone(&calls);
        JobFn::new(move |_cancel| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
    };
    let shutdown = CancellationToken::new();

    let lose = async {
        tokio::time::sleep(Duration::from_secs(20)).await;
        provider.expire("bautista");
        Instant::now()
    };
    let (outcome, lost_at) = tokio::join!(exec.run(&body, &shutdown), lose);

    assert_eq!(outcome.unwrap(), RunOutcome::Stopped(StopSource::LockLost));
    assert_eq!(Instant::now(), lost_at);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.count("LostLock"), 1);
    assert_eq!(sink.count("ReleasedLock"), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_interval_returns_promptly() {
    let sink = Arc::new(Recorder::default());
    let exec = NonConcurrentExecutor::new(
        job("juan"),
        Arc::new(MemoryLockProvider::new()),
        sink.clone(),
        RetryPolicy::default(),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let body = {
        let calls = Arc::clone(&calls);
        JobFn::new(move |_cancel| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
    };
    let shutdown = CancellationToken::new();

    let cancel = async {
        tokio::time::sleep(Duration::from_secs(45)).await;
        shutdown.cancel();
        Instant::now()
    };
    let (outcome, cancelled_at) = tokio::join!(exec.run(&body, &shutdown), cancel);

    assert!(outcome.is_ok());
    assert_eq!(Instant::now(), cancelled_at);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_runs_never_overlap() {
    let provider: Arc<dyn LockProvider> = Arc::new(MemoryLockProvider::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));

    // Each body fails on its second invocation, handing the lock to the other run.
    let body = || {
        let inside = Arc::clone(&inside);
        let max_inside = Arc::clone(&max_inside);
        let total = Arc::clone(&total);
        let own = Arc::new(AtomicUsize::new(0));
        JobFn::new(move |_cancel| {
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            let total = Arc::clone(&total);
            let own = Arc::clone(&own);
            async move {
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                total.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(10)).await;
                inside.fetch_sub(1, Ordering::SeqCst);

                if own.fetch_add(1, Ordering::SeqCst) == 1 {
                    return Err(JobError::fail("second run fails"));
                }
                Ok(())
            }
        })
    };
    let exec = |p: &Arc<dyn LockProvider>| {
        NonConcurrentExecutor::new(
            job("felipe"),
            Arc::clone(p),
            Arc::new(Recorder::default()),
            RetryPolicy::default(),
        )
    };

    let (a_exec, b_exec) = (exec(&provider), exec(&provider));
    let (a_body, b_body) = (body(), body());
    let shutdown = CancellationToken::new();

    let (a, b) = tokio::join!(a_exec.run(&a_body, &shutdown), b_exec.run(&b_body, &shutdown));

    assert!(a.is_err());
    assert!(b.is_err());
    assert_eq!(total.load(Ordering::SeqCst), 4);
    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn supervisor_keeps_restarting_failing_job() {
    let sink = Arc::new(Recorder::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let body = {
        let calls = Arc::clone(&calls);
        JobFn::new(move |_cancel| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(JobError::fail("always broken")) }
        })
    };
    let sup = JobSupervisor::new(
        job("noah"),
        body,
        Arc::new(MemoryLockProvider::new()),
        sink.clone(),
    );

    sup.start().unwrap();
    // cycles at t=0, 60, 120, 180
    tokio::time::sleep(Duration::from_secs(200)).await;

    assert!(calls.load(Ordering::SeqCst) >= 3);
    assert_eq!(sup.state(), ExecutionState::Running);
    assert_eq!(sink.count("AcquiredLock"), sink.count("ReleasedLock"));

    sup.stop(Duration::from_secs(30)).await;
    assert_eq!(sup.state(), ExecutionState::Stopped);

    let before = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(calls.load(Ordering::SeqCst), before);

    assert_eq!(sink.count("JobStarted"), 1);
    assert_eq!(sink.count("JobStopping"), 1);
    assert_eq!(sink.count("JobStopped"), 1);
}

struct AlwaysPanics(Arc<AtomicUsize>);

#[async_trait]
impl JobBody for AlwaysPanics {
    async fn execute(&self, _cancel: CancellationToken) -> Result<(), JobError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        panic!("called `Option::unwrap()` on a `None` value")
    }
}

#[tokio::test(start_paused = true)]
async fn panicking_job_balances_lock_events_across_restarts() {
    let sink = Arc::new(Recorder::default());
    let provider = Arc::new(MemoryLockProvider::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let sup = JobSupervisor::new(
        job("bruno"),
        AlwaysPanics(Arc::clone(&calls)),
        provider.clone(),
        sink.clone(),
    );

    sup.start().unwrap();
    // cycles at t=0, 60, 120
    tokio::time::sleep(Duration::from_secs(130)).await;
    sup.stop(Duration::from_secs(5)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(sink.count("AcquiredLock"), 3);
    assert_eq!(
        sink.count("AcquiredLock"),
        sink.count("ReleasedLock") + sink.count("LostLock")
    );
    assert!(!provider.is_held("bruno"));
    assert_eq!(sup.state(), ExecutionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn only_one_instance_of_a_fleet_runs_the_job() {
    let provider: Arc<dyn LockProvider> = Arc::new(MemoryLockProvider::new());
    let runs: Arc<Mutex<Vec<&'static str>>> = Arc::default();

    let instance = |tag: &'static str| {
        let runs = Arc::clone(&runs);
        JobSupervisor::new(
            job("liam"),
            JobFn::new(move |_cancel| {
                runs.lock().unwrap().push(tag);
                async { Ok(()) }
            }),
            Arc::clone(&provider),
            Arc::new(Recorder::default()),
        )
    };
    let first = instance("first");
    let second = instance("second");

    first.start().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    second.start().unwrap();

    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(runs.lock().unwrap().iter().all(|t| *t == "first"));

    first.stop(Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(runs.lock().unwrap().last(), Some(&"second"));

    second.stop(Duration::from_secs(5)).await;
}
