//! Bounded retry with linear backoff.
//!
//! The policy is kept apart from the transport so it can be exercised with
//! plain closures under tokio's paused clock.

use chatsweep_core::config::HttpConfig;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How many times a remote call is attempted and how long to wait between
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed part of every wait.
    pub base_delay: Duration,
    /// Added once per preceding attempt.
    pub step_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            step_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Build the policy from HTTP configuration.
    pub fn from_config(http: &HttpConfig) -> Self {
        Self {
            max_retries: http.max_retries,
            base_delay: Duration::from_millis(http.backoff_base_ms),
            step_delay: Duration::from_millis(http.backoff_step_ms),
        }
    }

    /// Policy that retries without waiting.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            step_delay: Duration::ZERO,
        }
    }

    /// Total number of attempts per call.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait after the failed attempt with the given zero-based index.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay + self.step_delay.saturating_mul(attempt)
    }
}

/// Why a single attempt failed. Every variant is retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// The server answered with a non-success status.
    Status(u16),
    /// Timeout, connection reset, TLS failure and other transport faults.
    Transport(String),
    /// The body could not be decoded as JSON.
    Decode(String),
    /// The body was valid JSON but lacked a required field.
    MissingField(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Decode(msg) => write!(f, "invalid response body: {}", msg),
            Self::MissingField(field) => write!(f, "response is missing `{}`", field),
        }
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// All attempts of one call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
    /// Attempts made.
    pub attempts: u32,
    /// Error of the final attempt.
    pub last_error: AttemptError,
}

impl fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} attempt(s)", self.last_error, self.attempts)
    }
}

impl std::error::Error for RetryExhausted {}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// `op` receives the zero-based attempt index. After a failed attempt the
/// task sleeps for [`RetryPolicy::delay_for`] unless it was the last one.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let attempts = policy.attempts();
    let mut last_error = AttemptError::Transport("no attempt was made".to_string());

    for attempt in 0..attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!("{} attempt {}/{} failed: {}", label, attempt + 1, attempts, err);
                last_error = err;
                if attempt + 1 < attempts {
                    let delay = policy.delay_for(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    Err(RetryExhausted {
        attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn delay_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures_with_linear_waits() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = retry_with_backoff(&policy, "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(AttemptError::Status(503))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after the first failure, 2s after the second.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_last_error_without_trailing_sleep() {
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };
        let started = Instant::now();

        let result: Result<(), _> = retry_with_backoff(&policy, "test", |attempt| async move {
            Err(AttemptError::MissingField(format!("field{}", attempt)))
        })
        .await;

        let err = result.expect_err("must exhaust");
        assert_eq!(err.attempts, 2);
        assert_eq!(err.last_error, AttemptError::MissingField("field1".to_string()));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&RetryPolicy::immediate(0), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AttemptError::Transport("reset".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
