//! Configuration management and environment variable loading

use crate::resilience::RetryConfig;
use crate::{Result, TandemError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Load environment variables from a `.env` file
///
/// Looks in the current directory and its parents. A missing file is not an
/// error; a malformed one is.
///
/// # Example
///
/// ```no_run
/// use tandem_core::load_env;
///
/// load_env().ok();
/// let endpoint = std::env::var("PROJECT_ENDPOINT").unwrap_or_default();
/// ```
pub fn load_env() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::info!("Loaded environment from: {}", path.display());
            Ok(())
        }
        Err(dotenvy::Error::LineParse(line, pos)) => Err(TandemError::config(format!(
            "Failed to parse .env file at line {}, position {}",
            line, pos
        ))),
        Err(dotenvy::Error::Io(_)) => {
            tracing::debug!("No .env file found - using system environment variables only");
            Ok(())
        }
        Err(e) => Err(TandemError::config(format!(
            "Failed to load .env file: {}",
            e
        ))),
    }
}

/// Load environment variables from a specific file
pub fn load_env_from_path<P: AsRef<Path>>(path: P) -> Result<()> {
    match dotenvy::from_path(path.as_ref()) {
        Ok(_) => {
            tracing::info!("Loaded environment from: {}", path.as_ref().display());
            Ok(())
        }
        Err(e) => Err(TandemError::config(format!(
            "Failed to load {} environment file: {}",
            path.as_ref().display(),
            e
        ))),
    }
}

/// Get required environment variable
pub fn get_required_env(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(TandemError::config(format!(
            "Required environment variable '{}' is not set. \
             Check your .env file or system environment.",
            key
        ))),
    }
}

/// Get optional environment variable with default
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get environment variable as boolean
pub fn get_env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| match v.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

/// Get environment variable parsed as `T`
pub fn get_env_int<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Coordinator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Deadline for every single invocation
    #[serde(with = "secs")]
    pub stage_timeout: Duration,

    /// Retry policy for failed invocations
    pub retry: RetryConfig,

    /// Use `invoke_stream` and forward partial events to the observer
    pub streaming: bool,

    /// Drop the in-flight invocation on cancellation instead of letting it finish
    pub cancel_in_flight: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(300),
            retry: RetryConfig::default(),
            streaming: false,
            cancel_in_flight: true,
        }
    }
}

impl CoordinatorConfig {
    /// Read overrides from `TANDEM_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retry = RetryConfig {
            max_attempts: get_env_int("TANDEM_MAX_ATTEMPTS", defaults.retry.max_attempts),
            initial_delay: Duration::from_millis(get_env_int(
                "TANDEM_RETRY_INITIAL_DELAY_MS",
                defaults.retry.initial_delay.as_millis() as u64,
            )),
            retry_invocation_errors: get_env_bool(
                "TANDEM_RETRY_INVOCATION_ERRORS",
                defaults.retry.retry_invocation_errors,
            ),
            ..defaults.retry.clone()
        };

        Self {
            stage_timeout: Duration::from_secs(get_env_int(
                "TANDEM_STAGE_TIMEOUT_SECS",
                defaults.stage_timeout.as_secs(),
            )),
            retry,
            streaming: get_env_bool("TANDEM_STREAMING", defaults.streaming),
            cancel_in_flight: defaults.cancel_in_flight,
        }
    }

    /// Reject settings the coordinator cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.stage_timeout.is_zero() {
            return Err(TandemError::config("stage_timeout must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(TandemError::config("retry.max_attempts must be at least 1"));
        }
        if self.retry.multiplier < 1.0 {
            return Err(TandemError::config("retry.multiplier must be >= 1.0"));
        }
        Ok(())
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
