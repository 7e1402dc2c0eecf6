//! Disarmable deadline for upstream call setup
//!
//! Arming spawns a timer task that cancels a [`CancellationToken`] when the
//! deadline passes. Futures raced through [`Deadline::guard`] are dropped as
//! soon as the token fires, which aborts an in-flight HTTP request. The timer
//! is disarmed explicitly once the upstream accepts the call, and implicitly
//! when the guard is dropped, so no exit path leaves a pending timer behind.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct Deadline {
    expired: CancellationToken,
    disarmed: CancellationToken,
    duration: Duration,
}

impl Deadline {
    /// Start the timer. Must be called inside a tokio runtime.
    pub fn arm(duration: Duration) -> Self {
        let expired = CancellationToken::new();
        let disarmed = CancellationToken::new();

        let timer_expired = expired.clone();
        let timer_disarmed = disarmed.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    tracing::warn!(
                        deadline_ms = duration.as_millis() as u64,
                        "Deadline expired, aborting upstream call"
                    );
                    timer_expired.cancel();
                }
                _ = timer_disarmed.cancelled() => {
                    tracing::trace!("Deadline disarmed");
                }
            }
        });

        Self {
            expired,
            disarmed,
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Signal that fires when the deadline passes
    pub fn token(&self) -> CancellationToken {
        self.expired.clone()
    }

    pub fn is_expired(&self) -> bool {
        self.expired.is_cancelled()
    }

    /// Stop the timer. Idempotent.
    pub fn disarm(&self) {
        self.disarmed.cancel();
    }

    /// Run `fut` until it completes or the deadline fires, whichever is first.
    /// Returns `None` on expiry; `fut` is dropped at that point.
    pub async fn guard<F, T>(&self, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.expired.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.disarmed.cancel();
    }
}
