//! Polling with exponential backoff and cancellation support.
//!
//! Used to wait for freshly provisioned hosts to accept SSH and for the
//! database server to finish loading its dataset.

use anyhow::Result;
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for polling with exponential backoff.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Initial delay between checks
    pub initial_delay: Duration,
    /// Maximum delay between checks (cap for exponential growth)
    pub max_delay: Duration,
    /// Maximum total time to wait before timeout
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Poll `check` until it returns `Ok(true)`.
///
/// # Returns
/// * `Ok(())` - Resource is ready
/// * `Err` - Timeout, cancelled, or check returned an error
///
/// Delays never overshoot the deadline, so a timeout is reported close to
/// `config.timeout` even with a large `max_delay`.
pub async fn wait_for_resource<F, Fut>(
    config: WaitConfig,
    cancel: Option<&CancellationToken>,
    check: F,
    resource_name: &str,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + config.timeout;
    let mut attempts = 0u32;

    let mut delays = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .with_jitter()
        .build();

    loop {
        attempts += 1;

        if cancel.is_some_and(|token| token.is_cancelled()) {
            anyhow::bail!("Wait for {} cancelled", resource_name);
        }

        match check().await {
            Ok(true) => {
                debug!(resource = %resource_name, attempts, "Resource ready");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(resource = %resource_name, error = ?e, "Resource check failed");
                return Err(e);
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            anyhow::bail!(
                "Timeout waiting for {} after {:?} ({} attempts)",
                resource_name,
                config.timeout,
                attempts
            );
        }

        let delay = delays.next().unwrap_or(config.max_delay).min(remaining);
        debug!(
            resource = %resource_name,
            attempt = attempts,
            delay_ms = delay.as_millis(),
            "Resource not ready, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = async {
                match cancel {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                anyhow::bail!("Wait for {} cancelled", resource_name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(timeout: Duration) -> WaitConfig {
        WaitConfig {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_ready_after_retries() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        wait_for_resource(
            fast_config(Duration::from_secs(5)),
            None,
            move || async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 2) },
            "flaky",
        )
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = wait_for_resource(
            fast_config(Duration::from_millis(50)),
            None,
            || async { Ok(false) },
            "never",
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("Timeout waiting for never"));
    }

    #[tokio::test]
    async fn test_check_error_propagates() {
        let err = wait_for_resource(
            fast_config(Duration::from_secs(5)),
            None,
            || async { Err::<bool, _>(anyhow::anyhow!("boom")) },
            "broken",
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let err = wait_for_resource(
            fast_config(Duration::from_secs(5)),
            Some(&token),
            || async { Ok(false) },
            "cancelled",
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
