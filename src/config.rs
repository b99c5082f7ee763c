use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::desk::{DeskSettings, DEFAULT_CHAT_THREAD};
use crate::model::Sender;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub messages: MessagesConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file holding every collection (defaults to $XDG_DATA_HOME/jobdesk/store.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesConfig {
  /// Minutes after sending during which a message can be edited; null disables the limit
  #[serde(default = "default_edit_window_minutes")]
  pub edit_window_minutes: Option<i64>,
  /// Chat thread used when none is given
  #[serde(default = "default_thread")]
  pub default_thread: String,
  /// Sender recorded on messages written from this install
  #[serde(default = "default_participant")]
  pub participant: Sender,
}

impl Default for MessagesConfig {
  fn default() -> Self {
    Self {
      edit_window_minutes: default_edit_window_minutes(),
      default_thread: default_thread(),
      participant: default_participant(),
    }
  }
}

fn default_edit_window_minutes() -> Option<i64> {
  Some(30)
}

fn default_thread() -> String {
  DEFAULT_CHAT_THREAD.to_string()
}

fn default_participant() -> Sender {
  Sender::User
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  /// Filter directive used when JOBDESK_LOG is unset
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Directory for rolling log files (defaults to $XDG_DATA_HOME/jobdesk/logs)
  pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      directory: None,
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jobdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jobdesk/config.yaml
  ///
  /// Without any file, defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("jobdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jobdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is valid and means "all defaults"
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  fn validate(&self) -> Result<()> {
    if let Some(minutes) = self.messages.edit_window_minutes {
      if minutes < 0 {
        return Err(eyre!("messages.edit_window_minutes must not be negative"));
      }
    }
    if self.messages.participant == Sender::System {
      return Err(eyre!("messages.participant cannot be 'system'"));
    }
    if self.messages.default_thread.trim().is_empty() {
      return Err(eyre!("messages.default_thread must not be empty"));
    }
    Ok(())
  }

  pub fn desk_settings(&self) -> DeskSettings {
    DeskSettings {
      edit_window: self.messages.edit_window_minutes.map(Duration::minutes),
      participant: self.messages.participant,
    }
  }
}
