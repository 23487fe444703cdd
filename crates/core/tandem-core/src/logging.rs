//! Logging setup

use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: OnceLock<()> = OnceLock::new();

/// Default filter when neither `RUST_LOG` nor `TANDEM_LOG_LEVEL` is set
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Filter directive from `TANDEM_LOG_LEVEL`, or the default
fn fallback_level() -> String {
    std::env::var("TANDEM_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Build the env filter: `RUST_LOG` first, then `TANDEM_LOG_LEVEL`
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_level()))
}

/// Initialize the global logging system
///
/// Installs a registry with an env filter and a stderr fmt layer. Calling it
/// again is a no-op, as is calling it after another subscriber was installed.
pub fn init_logging() {
    INIT.get_or_init(|| {
        let installed = tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
        if installed.is_err() {
            tracing::debug!("Global subscriber already set; keeping it");
        }
    });
}

/// Namespaced logger for per-agent messages
#[derive(Debug, Clone)]
pub struct Logger {
    namespace: String,
}

impl Logger {
    /// Create a new logger with a namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Namespace prefix
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Log an info message
    pub fn info(&self, message: &str) {
        tracing::info!("[{}] {}", self.namespace, message);
    }

    /// Log a debug message
    pub fn debug(&self, message: &str) {
        tracing::debug!("[{}] {}", self.namespace, message);
    }

    /// Log a warning message
    pub fn warn(&self, message: &str) {
        tracing::warn!("[{}] {}", self.namespace, message);
    }
}
