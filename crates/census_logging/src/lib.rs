//! Shared logging setup for census binaries.

use anyhow::{Context, Result};
use census_config::LogConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable overriding the configured log filter.
pub const LOG_ENV_VAR: &str = "CENSUS_LOG";

const LOG_FILE_PREFIX: &str = "census.log";

/// Initialize tracing once at startup: a stderr layer always, plus a
/// daily-rolling file layer when a log directory is configured.
pub fn init(config: &LogConfig) -> Result<()> {
    match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).with_context(|| {
                format!("failed to create log directory {}", directory.display())
            })?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX))
                .with_ansi(false)
                .with_filter(make_filter(&config.level)?);
            let stderr_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(make_filter(&config.level)?);
            tracing_subscriber::registry()
                .with(file_layer)
                .with(stderr_layer)
                .try_init()
                .context("tracing subscriber already initialized")?;
        }
        None => {
            let stderr_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(make_filter(&config.level)?);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .try_init()
                .context("tracing subscriber already initialized")?;
        }
    }

    Ok(())
}

/// `CENSUS_LOG` wins over the configured level.
fn make_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV_VAR) {
        return Ok(filter);
    }
    EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))
}
