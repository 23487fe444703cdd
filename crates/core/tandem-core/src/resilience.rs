//! Retry with exponential backoff for stage invocations

use crate::error::AdapterError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per stage, the first one included
    pub max_attempts: usize,

    /// Delay before the second attempt
    #[serde(with = "millis")]
    pub initial_delay: Duration,

    /// Upper bound for any delay
    #[serde(with = "millis")]
    pub max_delay: Duration,

    /// Backoff multiplier
    pub multiplier: f64,

    /// Add up to 20% random jitter to each delay
    pub jitter: bool,

    /// Also retry `AdapterError::Invocation` (semantic failures)
    pub retry_invocation_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
            retry_invocation_errors: false,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Whether `error` on attempt `attempt` (one-based) earns another try
    pub fn should_retry(&self, error: &AdapterError, attempt: usize) -> bool {
        if attempt >= self.max_attempts.max(1) {
            return false;
        }
        match error {
            AdapterError::Timeout(_) | AdapterError::Transient(_) => true,
            AdapterError::Invocation(_) => self.retry_invocation_errors,
            AdapterError::Cancelled => false,
        }
    }

    /// Delay after failed attempt `attempt` (one-based), without jitter
    pub fn base_delay(&self, attempt: usize) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exp);
        Duration::from_millis(millis.min(self.max_delay.as_millis() as f64) as u64)
    }

    fn delay(&self, attempt: usize) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..0.2);
        base.mul_f64(1.0 + extra).min(self.max_delay)
    }
}

/// Outcome of a retried operation
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Final result
    pub result: Result<T, AdapterError>,
    /// Attempts made
    pub attempts: usize,
}

/// Run `f` until it succeeds, fails permanently, or attempts run out
///
/// `f` receives the one-based attempt number.
pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, mut f: F) -> RetryOutcome<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut attempt = 1;

    loop {
        match f(attempt).await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) if config.should_retry(&e, attempt) => {
                let delay = config.delay(attempt);
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt, config.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    error!("All {} attempts failed: {}", attempt, e);
                }
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt,
                };
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: false,
            retry_invocation_errors: false,
        }
    }

    #[tokio::test]
    async fn test_retry_success() {
        let outcome = retry_with_backoff(&fast(), |attempt| async move {
            if attempt < 2 {
                Err(AdapterError::transient("not yet"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let outcome: RetryOutcome<()> = retry_with_backoff(&fast(), |_| async {
            Err(AdapterError::Timeout(Duration::from_millis(1)))
        })
        .await;

        assert_eq!(outcome.attempts, 3);
        assert!(matches!(outcome.result, Err(AdapterError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_invocation_errors_not_retried_by_default() {
        let outcome: RetryOutcome<()> = retry_with_backoff(&fast(), |_| async {
            Err(AdapterError::invocation("run failed"))
        })
        .await;
        assert_eq!(outcome.attempts, 1);

        let config = RetryConfig {
            retry_invocation_errors: true,
            ..fast()
        };
        let outcome: RetryOutcome<()> = retry_with_backoff(&config, |_| async {
            Err(AdapterError::invocation("run failed"))
        })
        .await;
        assert_eq!(outcome.attempts, 3);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = fast();
        assert_eq!(config.base_delay(1), Duration::from_millis(1));
        assert_eq!(config.base_delay(2), Duration::from_millis(2));
        assert_eq!(config.base_delay(3), Duration::from_millis(4));
        assert_eq!(config.base_delay(10), Duration::from_millis(5));
    }

    #[test]
    fn test_never_retry_cancelled() {
        assert!(!RetryConfig::default().should_retry(&AdapterError::Cancelled, 1));
        assert!(!RetryConfig::none().should_retry(&AdapterError::transient("x"), 1));
    }
}
