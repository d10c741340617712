use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use redmon_core::{MonitorError, RedditApiError};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Retry config tuned for the Reddit API
    pub fn reddit() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after a specific delay (rate limits with retry-after)
    RetryWithDelay(Duration),
    /// Don't retry (permanent failures)
    NoRetry,
}

/// Determine retry strategy based on error type
pub fn retry_strategy(error: &MonitorError) -> RetryStrategy {
    match error {
        MonitorError::RedditApi(api_error) => match api_error {
            RedditApiError::RateLimitExceeded { retry_after } => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            RedditApiError::ServerError { .. } => RetryStrategy::Retry,
            RedditApiError::RequestTimeout => RetryStrategy::Retry,
            RedditApiError::InvalidResponse { .. } => RetryStrategy::Retry,
            RedditApiError::AuthenticationFailed { .. } => RetryStrategy::NoRetry,
            RedditApiError::InvalidToken => RetryStrategy::NoRetry,
            RedditApiError::Forbidden { .. } => RetryStrategy::NoRetry,
            RedditApiError::NotFound { .. } => RetryStrategy::NoRetry,
        },
        MonitorError::Network(reqwest_error) => {
            if reqwest_error.is_timeout() || reqwest_error.is_connect() {
                RetryStrategy::Retry
            } else {
                RetryStrategy::NoRetry
            }
        }
        _ => RetryStrategy::NoRetry,
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exponential = if attempt == 0 {
        config.base_delay_ms
    } else {
        let multiplier = config.backoff_multiplier.powi(attempt as i32);
        ((config.base_delay_ms as f64 * multiplier) as u64).min(config.max_delay_ms)
    };

    // Jitter to prevent thundering herd
    let jitter_range = (exponential as f64 * config.jitter_factor) as u64;
    let jitter = if jitter_range > 0 {
        fastrand::u64(0..=jitter_range)
    } else {
        0
    };

    Duration::from_millis((exponential + jitter).min(config.max_delay_ms))
}

/// Wraps API operations with retry logic for transient failures.
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `operation` until it succeeds, a permanent error comes back, or the
    /// attempt budget runs out. The final error is returned as-is.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, MonitorError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, MonitorError>>,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            "Operation {} succeeded after {} retries",
                            operation_name, attempt
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            let out_of_attempts = attempt + 1 >= self.config.max_attempts;
            match retry_strategy(&error) {
                RetryStrategy::NoRetry => {
                    debug!(
                        "Not retrying {} due to error type: {}",
                        operation_name, error
                    );
                    return Err(error);
                }
                _ if out_of_attempts => {
                    warn!(
                        "Operation {} failed after {} attempts: {}",
                        operation_name, self.config.max_attempts, error
                    );
                    return Err(error);
                }
                RetryStrategy::Retry => {
                    let delay = backoff_delay(attempt, &self.config);
                    info!(
                        "Retrying {} in {:?} due to: {}",
                        operation_name, delay, error
                    );
                    sleep(delay).await;
                }
                RetryStrategy::RetryWithDelay(delay) => {
                    info!(
                        "Retrying {} after server-specified delay of {:?} due to: {}",
                        operation_name, delay, error
                    );
                    sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }
}
