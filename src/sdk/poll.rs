use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::error::GatewayError;

/// Implemented by per-capability task results so the poller can tell a
/// finished job from one still in flight.
pub trait TaskProbe {
    fn is_terminal(&self) -> bool;
}

/// Drive a just-submitted task to a terminal state.
///
/// Re-runs `query` every `interval` until it reports a terminal result,
/// then returns that result. Transient (retryable-class) query failures
/// are swallowed and retried on the next tick: an individual HTTP hiccup
/// should not abort an otherwise-healthy generation job. Fatal failures
/// (unknown task, rejected credentials) propagate immediately. Once
/// `max_wait` would be exceeded the poller gives up with a timeout, which
/// is logged distinctly from a vendor-reported failure.
pub async fn poll_until_terminal<R, F, Fut>(
    mut query: F,
    max_wait: Duration,
    interval: Duration,
) -> Result<R, GatewayError>
where
    R: TaskProbe,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, GatewayError>>,
{
    let started = Instant::now();

    loop {
        match query().await {
            Ok(result) if result.is_terminal() => return Ok(result),
            Ok(_) => {
                debug!(
                    elapsed_secs = started.elapsed().as_secs(),
                    "task still in flight"
                );
            }
            Err(error) if !error.retryable() => return Err(error),
            Err(error) => {
                warn!(error = %error, "transient failure while polling, will retry");
            }
        }

        if started.elapsed() + interval > max_wait {
            let elapsed_secs = started.elapsed().as_secs();
            warn!(
                elapsed_secs,
                max_wait_secs = max_wait.as_secs(),
                "task never reached a terminal state before the deadline"
            );
            return Err(GatewayError::Timeout { elapsed_secs });
        }

        sleep(interval).await;
    }
}
