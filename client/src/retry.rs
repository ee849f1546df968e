//! Retry logic for ledger read requests.
//!
//! Reads (blockhash, simulation, signature statuses) are retried with
//! exponential backoff on transient transport errors. Broadcasts are not
//! routed through here.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// JSON-RPC code returned by a node that is behind the cluster
const NODE_UNHEALTHY_CODE: &str = "-32005";

/// Retry strategy configuration
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    /// Maximum number of retries
    pub max_retries: usize,
    /// Initial retry delay
    pub initial_delay: Duration,
    /// Maximum retry delay
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
}

impl RetryStrategy {
    /// Create a new retry strategy from client config
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            multiplier: config.retry_multiplier,
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(self.multiplier)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Check if an error is retryable
    pub fn is_retryable(error: &ClientError) -> bool {
        match error {
            ClientError::NetworkError(_) => true,
            ClientError::RateLimitExceeded(_) => true,
            // 5xx from the gateway, or a node that is lagging
            ClientError::RpcError(msg) => {
                msg.contains("500")
                    || msg.contains("502")
                    || msg.contains("503")
                    || msg.contains(NODE_UNHEALTHY_CODE)
            }
            ClientError::InvalidResponse(_) => true,
            _ => false,
        }
    }

    /// Execute a function with retry logic
    pub async fn retry<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!("Attempt {} of {}", attempts, self.max_retries + 1);

            match operation().await {
                Ok(result) => {
                    if attempts > 1 {
                        debug!("Operation succeeded after {} attempts", attempts);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !Self::is_retryable(&error) {
                        warn!("Non-retryable error: {:?}", error);
                        return Err(error);
                    }

                    if attempts > self.max_retries {
                        warn!(
                            "Max retries ({}) exceeded. Last error: {:?}",
                            self.max_retries, error
                        );
                        return Err(ClientError::MaxRetriesExceeded(self.max_retries));
                    }

                    let delay = match backoff.next_backoff() {
                        Some(d) => d,
                        None => {
                            warn!("Backoff exhausted");
                            return Err(ClientError::MaxRetriesExceeded(self.max_retries));
                        }
                    };

                    warn!(
                        "Attempt {} failed: {:?}. Retrying in {:?}",
                        attempts, error, delay
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_strategy(max_retries: usize) -> RetryStrategy {
        RetryStrategy {
            max_retries,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_retry_strategy_from_config() {
        let config = ClientConfig::new();
        let strategy = RetryStrategy::from_config(&config);
        assert_eq!(strategy.max_retries, config.max_retries);
        assert_eq!(
            strategy.initial_delay,
            Duration::from_millis(config.retry_initial_delay_ms)
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(RetryStrategy::is_retryable(&ClientError::RateLimitExceeded(
            60
        )));
        assert!(RetryStrategy::is_retryable(&ClientError::RpcError(
            "HTTP 503 Service Unavailable: busy".to_string()
        )));
        assert!(RetryStrategy::is_retryable(&ClientError::RpcError(
            "Node is behind by 42 slots (code: -32005)".to_string()
        )));

        // Program-level and wallet errors are final
        assert!(!RetryStrategy::is_retryable(&ClientError::RpcError(
            "Invalid param: WrongSize (code: -32602)".to_string()
        )));
        assert!(!RetryStrategy::is_retryable(&ClientError::SigningRejected(
            "declined".to_string()
        )));
        assert!(!RetryStrategy::is_retryable(&ClientError::BroadcastFailed(
            "blockhash not found".to_string()
        )));
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let strategy = fast_strategy(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = strategy
            .retry(|| async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Ok::<u64, ClientError>(42)
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_retries() {
        let strategy = fast_strategy(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = strategy
            .retry(|| async {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(ClientError::InvalidResponse("truncated body".to_string()))
                } else {
                    Ok::<u64, ClientError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_max_retries_exceeded() {
        let strategy = fast_strategy(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = strategy
            .retry(|| async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<u64, ClientError>(ClientError::RateLimitExceeded(1))
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            ClientError::MaxRetriesExceeded(2)
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 3); // Initial + 2 retries
    }

    #[tokio::test]
    async fn test_retry_non_retryable_error() {
        let strategy = fast_strategy(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = strategy
            .retry(|| async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<u64, ClientError>(ClientError::InvalidAddress("xyz".to_string()))
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            ClientError::InvalidAddress(_)
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 1); // No retries
    }
}
