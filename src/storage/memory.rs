//! In-memory storage backend.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::KeyValueStore;
use crate::error::Result;

/// Storage that lives only as long as the process.
/// Used for ephemeral sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KeyValueStore for MemoryStorage {
  fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
    Ok(self.entries.lock()?.get(key).cloned())
  }

  fn write(&self, key: &str, value: &[u8]) -> Result<()> {
    self.entries.lock()?.insert(key.to_string(), value.to_vec());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.entries.lock()?.remove(key);
    Ok(())
  }

  fn keys(&self, prefix: &str) -> Result<Vec<String>> {
    let entries = self.entries.lock()?;
    Ok(
      entries
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_read_missing_key() {
    let storage = MemoryStorage::new();
    assert!(storage.read("nothing").unwrap().is_none());
  }

  #[test]
  fn test_write_overwrites() {
    let storage = MemoryStorage::new();
    storage.write("k", b"one").unwrap();
    storage.write("k", b"two").unwrap();
    assert_eq!(storage.read("k").unwrap(), Some(b"two".to_vec()));
  }

  #[test]
  fn test_keys_by_prefix() {
    let storage = MemoryStorage::new();
    storage.write("dispute_j1", b"[]").unwrap();
    storage.write("dispute_messages_1", b"[]").unwrap();
    storage.write("issue_j1", b"[]").unwrap();

    let keys = storage.keys("dispute_").unwrap();
    assert_eq!(keys, vec!["dispute_j1", "dispute_messages_1"]);

    storage.remove("dispute_j1").unwrap();
    assert_eq!(storage.keys("dispute_").unwrap().len(), 1);
  }
}
