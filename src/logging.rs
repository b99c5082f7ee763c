//! Tracing setup: daily rolling log files, so terminal output stays clean.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Environment variable overriding the configured filter.
pub const LOG_ENV: &str = "JOBDESK_LOG";

/// Install the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard> {
  let dir = match &config.directory {
    Some(dir) => dir.clone(),
    None => default_log_dir()?,
  };
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, "jobdesk.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(filter(config))
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

fn filter(config: &LoggingConfig) -> EnvFilter {
  EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.level))
}

fn default_log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("jobdesk").join("logs"))
}
