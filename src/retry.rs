//! Retry logic with exponential backoff
//!
//! This module provides configurable retry logic for transient failures.
//! It implements exponential backoff with optional jitter to prevent thundering herd.
//!
//! # Example
//!
//! ```no_run
//! use social_dl::retry::{IsRetryable, RetryState, with_retry};
//! use social_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let mut state = RetryState::new(&config);
//! with_retry(5, &config, &mut state, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! println!("needed {} retries", state.attempt);
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, rate limiting, server errors, connection reset) should
/// return `true`. Permanent failures (client errors, bad signatures, disk full) should
/// return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;

    /// Minimum delay requested by the remote side before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. }
            | FetchError::RateLimited { .. }
            | FetchError::ServerError { .. }
            | FetchError::Connect { .. } => true,
            // Signature or credential defect, retrying cannot help
            FetchError::ClientError { .. } => false,
            FetchError::Decode { .. } => false,
            FetchError::Cancelled => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Retry bookkeeping for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// Retries performed so far (0 = first attempt in progress)
    pub attempt: u32,
    /// Base delay before the next retry (before jitter)
    pub next_delay: Duration,
}

impl RetryState {
    /// Fresh state starting at the configured initial delay
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            next_delay: config.initial_delay,
        }
    }

    /// Record a failed attempt and return how long to wait before the next one.
    fn advance(&mut self, config: &RetryConfig) -> Duration {
        let delay = self.next_delay;
        self.attempt += 1;

        // Calculate next delay with exponential backoff
        let next = Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
        self.next_delay = next.min(config.max_delay);

        if config.jitter {
            add_jitter(delay)
        } else {
            delay
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// # Arguments
///
/// * `max_retries` - Number of retries after the first attempt (0 = no retries)
/// * `config` - Backoff shape (initial/max delay, multiplier, jitter)
/// * `state` - Retry bookkeeping; on return `state.attempt` holds the retries performed
/// * `operation` - Async closure that returns `Result<T, E>` where `E` implements [`IsRetryable`]
///
/// # Returns
///
/// Returns the successful result or the last error after all retry attempts are exhausted.
pub async fn with_retry<F, Fut, T, E>(
    max_retries: u32,
    config: &RetryConfig,
    state: &mut RetryState,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    loop {
        match operation().await {
            Ok(result) => {
                if state.attempt > 0 {
                    tracing::info!(retries = state.attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && state.attempt < max_retries => {
                let mut wait = state.advance(config);
                if let Some(requested) = e.retry_after() {
                    wait = wait.max(requested);
                }

                tracing::warn!(
                    error = %e,
                    attempt = state.attempt,
                    max_retries,
                    delay_ms = wait.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(wait).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = state.attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
