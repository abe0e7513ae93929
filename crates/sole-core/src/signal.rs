//! Cancellation helpers shared by the executor and the supervisor.

use std::time::Duration;

use sole_model::StopSource;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::lock::LostSignal;

/// Sleeps for `delay` unless `token` fires first.
///
/// Returns `true` if the full delay elapsed, `false` if the wait was cancelled.
/// An already cancelled token returns `false` immediately.
pub async fn try_wait(delay: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// A cancellation token that fires when either the shutdown token or a lock's lost
/// signal fires, and remembers which one it was.
///
/// The shutdown side is wired as a child token; the lost side is forwarded by a small
/// background task that ends as soon as the merged token is cancelled or the signal is
/// dropped.
pub struct MergedSignal {
    token: CancellationToken,
    shutdown: CancellationToken,
    lost: LostSignal,
    forward: Option<JoinHandle<()>>,
}

impl MergedSignal {
    /// Must be called from within a tokio runtime when `lost` is supported.
    pub fn merge(shutdown: &CancellationToken, lost: &LostSignal) -> Self {
        let token = shutdown.child_token();

        let forward = lost.token().map(|lost_token| {
            let lost_token = lost_token.clone();
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = lost_token.cancelled() => token.cancel(),
                    _ = token.cancelled() => {}
                }
            })
        });
        if lost.is_lost() {
            token.cancel();
        }

        Self {
            token,
            shutdown: shutdown.clone(),
            lost: lost.clone(),
            forward,
        }
    }

    /// Token to hand to cooperative work.
    #[inline]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[inline]
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled() || self.lost.is_lost()
    }

    /// Which input fired. Lock loss wins when both did.
    pub fn source(&self) -> Option<StopSource> {
        if self.lost.is_lost() {
            Some(StopSource::LockLost)
        } else if self.shutdown.is_cancelled() || self.token.is_cancelled() {
            Some(StopSource::Shutdown)
        } else {
            None
        }
    }
}

impl Drop for MergedSignal {
    fn drop(&mut self) {
        if let Some(forward) = self.forward.take() {
            forward.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn try_wait_elapses() {
        let token = CancellationToken::new();
        assert!(try_wait(Duration::from_secs(60), &token).await);
    }

    #[tokio::test(start_paused = true)]
    async fn try_wait_returns_false_when_cancelled() {
        let token = CancellationToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { try_wait(Duration::from_secs(60), &token).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn try_wait_on_cancelled_token_is_immediate() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!try_wait(Duration::from_secs(3600), &token).await);
    }

    #[tokio::test]
    async fn shutdown_fires_merged_signal() {
        let shutdown = CancellationToken::new();
        let lost = LostSignal::watch(CancellationToken::new());
        let merged = MergedSignal::merge(&shutdown, &lost);
        assert!(!merged.is_fired());
        assert_eq!(merged.source(), None);

        shutdown.cancel();
        assert!(merged.is_fired());
        assert!(merged.token().is_cancelled());
        assert_eq!(merged.source(), Some(StopSource::Shutdown));
    }

    #[tokio::test]
    async fn lost_signal_fires_merged_token() {
        let shutdown = CancellationToken::new();
        let lost_token = CancellationToken::new();
        let merged = MergedSignal::merge(&shutdown, &LostSignal::watch(lost_token.clone()));

        lost_token.cancel();
        merged.token().cancelled().await;

        assert_eq!(merged.source(), Some(StopSource::LockLost));
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn already_lost_is_fired_on_merge() {
        let lost_token = CancellationToken::new();
        lost_token.cancel();
        let merged = MergedSignal::merge(
            &CancellationToken::new(),
            &LostSignal::watch(lost_token),
        );
        assert!(merged.token().is_cancelled());
        assert_eq!(merged.source(), Some(StopSource::LockLost));
    }

    #[tokio::test]
    async fn unsupported_lost_signal_only_follows_shutdown() {
        let shutdown = CancellationToken::new();
        let merged = MergedSignal::merge(&shutdown, &LostSignal::unsupported());
        assert!(!merged.is_fired());

        shutdown.cancel();
        merged.token().cancelled().await;
        assert_eq!(merged.source(), Some(StopSource::Shutdown));
    }
}
