use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{LockHandle, LockProvider, LostSignal};
use crate::{error::LockError, util::lock};

type SharedGuard = Arc<Mutex<Option<OwnedMutexGuard<()>>>>;

/// In-process lock provider.
///
/// Gives mutual exclusion between callers sharing one provider instance. Useful for
/// single-process deployments, demos and tests. [`MemoryLockProvider::expire`] drops a
/// held lock the way a backend would after losing its session.
#[derive(Clone)]
pub struct MemoryLockProvider {
    inner: Arc<Inner>,
}

struct Inner {
    detect_loss: bool,
    next_id: AtomicU64,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    locks: HashMap<String, Arc<AsyncMutex<()>>>,
    holders: HashMap<String, Holder>,
}

struct Holder {
    id: u64,
    lost: CancellationToken,
    guard: SharedGuard,
}

impl MemoryLockProvider {
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Handles from this provider report [`LostSignal::unsupported`].
    pub fn without_loss_detection() -> Self {
        Self::build(false)
    }

    fn build(detect_loss: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                detect_loss,
                next_id: AtomicU64::new(1),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Returns `true` if some handle currently holds `name`.
    pub fn is_held(&self, name: &str) -> bool {
        lock(&self.inner.state).holders.contains_key(name)
    }

    /// Forcibly drops the current holder of `name` and fires its lost signal.
    ///
    /// Returns `false` if nobody held the lock.
    pub fn expire(&self, name: &str) -> bool {
        let holder = lock(&self.inner.state).holders.remove(name);
        match holder {
            Some(holder) => {
                debug!(lock = name, holder = holder.id, "expiring lock");
                holder.lost.cancel();
                drop(lock(&holder.guard).take());
                true
            }
            None => false,
        }
    }

    fn mutex_for(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut state = lock(&self.inner.state);
        Arc::clone(state.locks.entry(name.to_string()).or_default())
    }
}

impl Default for MemoryLockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockProvider for MemoryLockProvider {
    async fn acquire(
        &self,
        name: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn LockHandle>, LockError> {
        if cancel.is_cancelled() {
            return Err(LockError::Cancelled);
        }
        let wait = self.mutex_for(name).lock_owned();

        let guard = match timeout {
            Some(timeout) => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LockError::Cancelled),
                res = tokio::time::timeout(timeout, wait) => res.map_err(|_| LockError::Timeout)?,
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LockError::Cancelled),
                guard = wait => guard,
            },
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let lost = CancellationToken::new();
        let guard: SharedGuard = Arc::new(Mutex::new(Some(guard)));

        lock(&self.inner.state).holders.insert(
            name.to_string(),
            Holder {
                id,
                lost: lost.clone(),
                guard: Arc::clone(&guard),
            },
        );
        trace!(lock = name, holder = id, "lock granted");

        Ok(Box::new(MemoryLockHandle {
            name: name.to_string(),
            id,
            lost: if self.inner.detect_loss {
                LostSignal::watch(lost)
            } else {
                LostSignal::unsupported()
            },
            guard,
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MemoryLockHandle {
    name: String,
    id: u64,
    lost: LostSignal,
    guard: SharedGuard,
    inner: Arc<Inner>,
}

impl MemoryLockHandle {
    fn release_now(&self) {
        let guard = lock(&self.guard).take();
        {
            let mut state = lock(&self.inner.state);
            if state
                .holders
                .get(&self.name)
                .is_some_and(|h| h.id == self.id)
            {
                state.holders.remove(&self.name);
            }
        }
        if guard.is_some() {
            trace!(lock = %self.name, holder = self.id, "lock returned");
        }
        drop(guard);
    }
}

#[async_trait]
impl LockHandle for MemoryLockHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn lost_signal(&self) -> LostSignal {
        self.lost.clone()
    }

    async fn release(&self) -> Result<(), LockError> {
        self.release_now();
        Ok(())
    }
}

impl Drop for MemoryLockHandle {
    fn drop(&mut self) {
        self.release_now();
    }
}
