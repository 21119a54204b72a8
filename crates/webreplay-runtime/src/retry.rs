//! Bounded retry with exponential backoff.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use webreplay_config::RetryConfig;
use webreplay_protocols::ReplayError;

use crate::wait::sleep_or_cancel;

/// Result of a retried operation together with how many attempts it took.
#[derive(Debug)]
pub struct Retried<T> {
    pub result: Result<T, ReplayError>,
    pub attempts: u32,
}

impl<T> Retried<T> {
    /// Rejected before the first attempt.
    pub fn rejected(error: ReplayError) -> Self {
        Self {
            result: Err(error),
            attempts: 0,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts` is reached. Backoff sleeps end early on cancellation.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    token: &CancellationToken,
    label: &str,
    mut operation: F,
) -> Retried<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReplayError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", label, attempt);
                }
                return Retried {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(e) => {
                if !e.is_retryable() || attempt >= max_attempts {
                    return Retried {
                        result: Err(e),
                        attempts: attempt,
                    };
                }

                let delay = config.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    label, attempt, max_attempts, e, delay
                );
                if let Err(cancelled) = sleep_or_cancel(delay, token).await {
                    return Retried {
                        result: Err(cancelled),
                        attempts: attempt,
                    };
                }
                attempt += 1;
            }
        }
    }
}
