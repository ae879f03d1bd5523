//! Retry with exponential backoff for document transfers
//!
//! Acquisition cycles never retry as a whole; the next scheduled trigger does
//! that. Inside a single download, though, a dropped connection or a 503 from
//! the document host is worth a few more attempts before reporting failure.
//!
//! # Example
//!
//! ```no_run
//! use issue_dl::retry::{IsRetryable, with_retry};
//! use issue_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! struct Flaky;
//!
//! impl std::fmt::Display for Flaky {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         f.write_str("flaky")
//!     }
//! }
//!
//! impl IsRetryable for Flaky {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn example() -> Result<(), Flaky> {
//! let config = RetryConfig::default();
//! let body = with_retry(&config, || async { Ok::<_, Flaky>(vec![0u8; 4]) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies errors as transient (worth retrying) or permanent
pub trait IsRetryable {
    /// Returns true if the operation should be attempted again
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Error::HttpStatus { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::Interrupted
            ),
            // The host answered with the wrong thing; asking again will not change it
            Error::InvalidDocument(_) => false,
            Error::Config { .. }
            | Error::ConfigParse(_)
            | Error::Resolution(_)
            | Error::Cache(_)
            | Error::Serialization(_)
            | Error::Other(_) => false,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// `config.max_attempts` counts retries after the first call, so the
/// operation runs at most `max_attempts + 1` times.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut retries = 0;
    let mut delay = config.initial_delay;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(attempts = retries + 1, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            tracing::debug!(error = %err, "permanent failure, not retrying");
            return Err(err);
        }
        if retries >= config.max_attempts {
            tracing::warn!(error = %err, attempts = retries + 1, "retries exhausted");
            return Err(err);
        }

        retries += 1;
        let wait = if config.jitter { add_jitter(delay) } else { delay };
        tracing::warn!(
            error = %err,
            retry = retries,
            max_attempts = config.max_attempts,
            delay_ms = wait.as_millis() as u64,
            "transient failure, retrying"
        );
        tokio::time::sleep(wait).await;

        delay = next_delay(delay, config);
    }
}

/// Backoff step, capped at `max_delay`
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier).min(config.max_delay)
}

/// Stretch a delay by a random factor in `[1.0, 2.0]`
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}
