//! Contract between the executor and a distributed lock backend.
//!
//! The executor only needs three things from a backend: a cancellable, optionally
//! unbounded acquire, an idempotent release, and a best-effort signal telling it
//! that exclusivity may have been lost. How the backend achieves mutual exclusion
//! is its own business.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::LockError;

mod memory;
pub use memory::MemoryLockProvider;

/// Fires at most once, when the backend can no longer guarantee that the lock is held.
///
/// A signal built with [`LostSignal::unsupported`] never fires; backends that cannot
/// detect loss hand those out.
#[derive(Debug, Clone, Default)]
pub struct LostSignal {
    token: Option<CancellationToken>,
}

impl LostSignal {
    pub fn watch(token: CancellationToken) -> Self {
        Self { token: Some(token) }
    }

    pub fn unsupported() -> Self {
        Self { token: None }
    }

    #[inline]
    pub fn is_supported(&self) -> bool {
        self.token.is_some()
    }

    /// `true` once the backend reported the loss. Always `false` when unsupported.
    #[inline]
    pub fn is_lost(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Completes when the lock is lost; pends forever when unsupported.
    pub async fn fired(&self) {
        match &self.token {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    pub(crate) fn token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }
}

/// A successfully acquired lock.
///
/// Owned by exactly one executor run. Implementations should also release on drop so a
/// panicking holder does not leak the lock.
#[async_trait]
pub trait LockHandle: Send + Sync {
    fn name(&self) -> &str;

    fn lost_signal(&self) -> LostSignal;

    /// Releases the lock. Idempotent; succeeds if the lock was already lost.
    async fn release(&self) -> Result<(), LockError>;
}

/// Backend that hands out named locks.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Waits for the named lock.
    ///
    /// `timeout = None` waits without bound. When `cancel` fires the wait is abandoned
    /// with [`LockError::Cancelled`] and no lock is left behind.
    async fn acquire(
        &self,
        name: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn LockHandle>, LockError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_signal_is_never_lost() {
        let s = LostSignal::unsupported();
        assert!(!s.is_supported());
        assert!(!s.is_lost());
    }

    #[test]
    fn watched_signal_reflects_token() {
        let token = CancellationToken::new();
        let s = LostSignal::watch(token.clone());
        assert!(s.is_supported());
        assert!(!s.is_lost());

        token.cancel();
        assert!(s.is_lost());
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_signal_pends() {
        let s = LostSignal::unsupported();
        let fired = tokio::time::timeout(Duration::from_secs(3600), s.fired()).await;
        assert!(fired.is_err());
    }
}
