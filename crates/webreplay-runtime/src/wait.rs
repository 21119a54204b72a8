//! Cancellable sleeps and deadline-bounded polling.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use webreplay_protocols::ReplayError;

/// Sleep for `duration` unless `token` fires first.
pub(crate) async fn sleep_or_cancel(
    duration: Duration,
    token: &CancellationToken,
) -> Result<(), ReplayError> {
    if duration.is_zero() {
        return if token.is_cancelled() {
            Err(ReplayError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ReplayError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Paces a poll loop: check, then `next()`, until the deadline passes.
pub(crate) struct Poller<'a> {
    interval: Duration,
    deadline: Instant,
    token: &'a CancellationToken,
}

impl<'a> Poller<'a> {
    pub(crate) fn new(interval: Duration, timeout: Duration, token: &'a CancellationToken) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            deadline: Instant::now() + timeout,
            token,
        }
    }

    /// Wait for the next poll. `Ok(false)` once the deadline has passed.
    pub(crate) async fn next(&self) -> Result<bool, ReplayError> {
        if self.token.is_cancelled() {
            return Err(ReplayError::Cancelled);
        }
        let now = Instant::now();
        if now >= self.deadline {
            return Ok(false);
        }
        sleep_or_cancel(self.interval.min(self.deadline - now), self.token).await?;
        Ok(true)
    }
}
