use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::GatewayError;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Delay before the attempt after `failed_attempts` failures: the base
    /// delay, doubling each time.
    fn delay_after(self, failed_attempts: u32) -> Duration {
        let factor = 1_u64 << failed_attempts.saturating_sub(1).min(5);
        self.base_delay.saturating_mul(factor as u32)
    }
}

/// Run `operation` up to `policy.max_attempts` times.
///
/// The error is classified before any retry is considered: credential and
/// quota rejections cannot succeed on resubmission and are returned
/// immediately, while throttling, transport failures and other vendor
/// errors are retried with exponential backoff until the attempt budget
/// runs out.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut failed_attempts = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                failed_attempts += 1;
                if !error.retryable() || failed_attempts >= policy.max_attempts {
                    return Err(error);
                }

                let delay = policy.delay_after(failed_attempts);
                warn!(
                    attempt = failed_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "vendor call failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}
