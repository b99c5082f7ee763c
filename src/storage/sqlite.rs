//! SQLite-backed key-value storage.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::KeyValueStore;
use crate::error::{Result, StoreError};

/// Schema for the key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Persistent storage in a single SQLite file.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the store at `path`, or at the default location when `None`.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }

    let conn = Connection::open(&path)?;
    debug!("Opened key-value store at {}", path.display());
    Self::with_connection(conn)
  }

  /// Open a store that is discarded when dropped.
  pub fn open_in_memory() -> Result<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| {
        StoreError::Io(std::io::Error::new(
          std::io::ErrorKind::NotFound,
          "Could not determine data directory",
        ))
      })?;

    Ok(data_dir.join("jobdesk").join("store.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.conn.lock()?;
    conn.execute_batch(KV_SCHEMA)?;
    Ok(())
  }
}

impl KeyValueStore for SqliteStorage {
  fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let conn = self.conn.lock()?;
    let value = conn
      .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
        row.get(0)
      })
      .optional()?;
    Ok(value)
  }

  fn write(&self, key: &str, value: &[u8]) -> Result<()> {
    let conn = self.conn.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
      params![key, value],
    )?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self.conn.lock()?;
    conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
    Ok(())
  }

  fn keys(&self, prefix: &str) -> Result<Vec<String>> {
    let conn = self.conn.lock()?;
    let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
    let keys = stmt
      .query_map([], |row| row.get::<_, String>(0))?
      .collect::<std::result::Result<Vec<_>, _>>()?;

    // Prefix filtering in Rust; LIKE would treat '_' in keys as a wildcard.
    Ok(keys.into_iter().filter(|k| k.starts_with(prefix)).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_roundtrip_value() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    assert!(storage.read("messages_chat").unwrap().is_none());

    storage.write("messages_chat", b"[1,2]").unwrap();
    assert_eq!(storage.read("messages_chat").unwrap(), Some(b"[1,2]".to_vec()));

    storage.write("messages_chat", b"[]").unwrap();
    assert_eq!(storage.read("messages_chat").unwrap(), Some(b"[]".to_vec()));
  }

  #[test]
  fn test_prefix_is_literal() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.write("issue_j1", b"[]").unwrap();
    storage.write("issueXj2", b"[]").unwrap();

    assert_eq!(storage.keys("issue_").unwrap(), vec!["issue_j1"]);
  }

  #[test]
  fn test_values_survive_reopen() {
    let dir = std::env::temp_dir().join(format!("jobdesk-test-{}", uuid::Uuid::new_v4()));
    let path = dir.join("nested").join("store.db");

    {
      let storage = SqliteStorage::open(Some(&path)).unwrap();
      storage.write("dispute_j1", b"[{\"id\":\"1\"}]").unwrap();
      storage.write("messages_chat-messages", b"[]").unwrap();
    }

    let storage = SqliteStorage::open(Some(&path)).unwrap();
    assert_eq!(
      storage.read("dispute_j1").unwrap(),
      Some(b"[{\"id\":\"1\"}]".to_vec())
    );
    assert_eq!(
      storage.keys("").unwrap(),
      vec!["dispute_j1", "messages_chat-messages"]
    );

    drop(storage);
    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn test_remove_missing_is_ok() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.remove("never-written").unwrap();
    storage.write("a", b"1").unwrap();
    storage.remove("a").unwrap();
    assert!(storage.read("a").unwrap().is_none());
  }
}
