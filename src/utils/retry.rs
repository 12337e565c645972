use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Retry strategy
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// Fixed delay
    Fixed(Duration),
    /// Exponential backoff
    Exponential {
        initial: Duration,
        multiplier: f64,
        max_delay: Duration,
    },
}

impl RetryStrategy {
    /// Delay before the nth retry
    pub fn get_delay(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::Fixed(delay) => *delay,
            RetryStrategy::Exponential { initial, multiplier, max_delay } => {
                let delay = initial.as_secs_f64() * multiplier.powf(attempt as f64);
                let delay = Duration::from_secs_f64(delay);
                std::cmp::min(delay, *max_delay)
            }
        }
    }
}

/// Retry configuration
pub struct RetryConfig<E> {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub strategy: RetryStrategy,
    /// Decides whether an error is retried
    pub should_retry: Box<dyn Fn(&E) -> bool + Send + Sync>,
}

impl<E> RetryConfig<E> {
    /// A single attempt, failures surface immediately.
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            strategy: RetryStrategy::Fixed(Duration::ZERO),
            should_retry: Box::new(|_| false),
        }
    }
}

/// Runs `operation` until it succeeds, a non-retryable error occurs, or attempts run out.
pub async fn retry_with_config<E, F, Fut, T>(config: &RetryConfig<E>, mut operation: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                attempt += 1;
                if attempt >= max_attempts || !(config.should_retry)(&error) {
                    return Err(error);
                }

                let delay = config.strategy.get_delay(attempt - 1);
                warn!(attempt, max_attempts, ?delay, %error, "Retrying after failure");
                sleep(delay).await;
            }
        }
    }
}
