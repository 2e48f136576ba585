//! Retry logic for transient pipeline errors.
//!
//! Store and lock backends can fail transiently (connection loss, lease
//! service hiccups). Retried operations must be idempotent; every
//! pipeline mutation is an upsert by natural key, so a replayed attempt
//! converges instead of duplicating.

use crate::error::PipelineError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that fails immediately.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Builds the retry policy from scheduler settings.
    pub fn from_scheduler(config: &wp_core::SchedulerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_base_delay_ms),
            ..Default::default()
        }
    }

    /// Delay before retry `attempt` (0-indexed), with optional jitter.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let delayed = if self.jitter {
            // Up to 25% jitter to spread contending retriers.
            capped * (1.0 + rand::thread_rng().gen_range(0.0..0.25))
        } else {
            capped
        };
        Duration::from_millis(delayed as u64)
    }
}

/// Executes an operation, retrying transient failures with backoff.
///
/// Only errors for which [`PipelineError::is_transient`] holds are
/// retried; anything else is returned on the first failure.
pub async fn run_with_retries<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    f: F,
) -> Result<T, PipelineError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        operation = %operation_name,
                        attempt = attempt + 1,
                        "operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_transient() || attempt >= config.max_retries {
                    if attempt > 0 {
                        warn!(
                            operation = %operation_name,
                            attempts = attempt + 1,
                            error = %err,
                            "operation failed after retries"
                        );
                    }
                    return Err(err);
                }

                let delay = config.calculate_delay(attempt);
                warn!(
                    operation = %operation_name,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient error, retrying"
                );
                attempt += 1;
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use wp_core::store::StoreError;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_calculate_delay_doubles_then_caps() {
        let config = RetryConfig {
            jitter: false,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            ..Default::default()
        };
        assert_eq!(config.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(config.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(config.calculate_delay(2), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = run_with_retries(&fast_config(3), "test_op", || async {
            Ok::<_, PipelineError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_non_transient_fails_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result = run_with_retries(&fast_config(3), "test_op", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(PipelineError::Validation("bad input".to_string()))
            }
        })
        .await;
        assert!(matches!(result, Err(PipelineError::Validation(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_eventually_succeeds() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result = run_with_retries(&fast_config(3), "test_op", || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(PipelineError::Store(StoreError::Unavailable(
                        "connection reset".to_string(),
                    )))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_exhausts_retries() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result = run_with_retries(&fast_config(2), "test_op", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(PipelineError::Store(StoreError::Unavailable(
                    "still down".to_string(),
                )))
            }
        })
        .await;
        assert!(matches!(result, Err(PipelineError::Store(_))));
        // Initial attempt plus two retries.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
