//! Logging setup
//!
//! Human-readable logs go to stderr. When `GLM_ADAPTER_LOG_DIR` is set, JSON
//! logs are also written to a daily-rolling file in that directory.
//!
//! ```ignore
//! let _guard = logging::init_logging()?;
//! tracing::info!("ready");
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter directives, e.g. `debug` or `glm_content_adapter=trace`
pub const LOG_ENV: &str = "GLM_ADAPTER_LOG";

/// Directory for the JSON log file
pub const LOG_DIR_ENV: &str = "GLM_ADAPTER_LOG_DIR";

const DEFAULT_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "glm-adapter.log";

/// Keeps the file writer alive; buffered lines are flushed on drop
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub filter: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    /// Read `GLM_ADAPTER_LOG` and `GLM_ADAPTER_LOG_DIR`
    pub fn from_env() -> Self {
        Self::from_values(std::env::var(LOG_ENV).ok(), std::env::var(LOG_DIR_ENV).ok())
    }

    pub fn from_values(filter: Option<String>, log_dir: Option<String>) -> Self {
        Self {
            filter: filter
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            log_dir: log_dir
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .map(PathBuf::from),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|e| {
            eprintln!(
                "Invalid {} value '{}': {}; using '{}'",
                LOG_ENV, self.filter, e, DEFAULT_FILTER
            );
            EnvFilter::new(DEFAULT_FILTER)
        })
    }
}

/// JSON file layer writing through a non-blocking daily appender
pub fn file_layer<S>(dir: &Path) -> Result<(impl Layer<S>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {:?}", dir))?;

    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(writer);

    Ok((layer, guard))
}

/// Initialize logging from the environment
pub fn init_logging() -> Result<LoggingGuard> {
    init_with(&LoggingConfig::from_env())
}

/// Initialize logging with an explicit configuration
///
/// Fails if a global subscriber is already installed.
pub fn init_with(config: &LoggingConfig) -> Result<LoggingGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file, file_guard) = match &config.log_dir {
        Some(dir) => {
            let (layer, guard) = file_layer(dir)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(stderr_layer)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(dir) = &config.log_dir {
        tracing::info!("Logging to {:?}", dir);
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
