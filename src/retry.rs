use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::types::Result;

/// Bounded retry budget for calls that cross a network boundary.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
        }
    }
}

/// Run `op`, retrying transient transport failures with exponential backoff.
/// Validation failures are returned immediately without a retry.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
        current_interval: policy.initial_delay,
        initial_interval: policy.initial_delay,
        max_interval: policy.initial_delay * 16,
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    };

    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = backoff.next_backoff().unwrap_or(policy.initial_delay);
                warn!(
                    "{} failed (attempt {}): {}; retrying in {:?}",
                    what, attempt, err, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
