//! Key-value storage adapter.
//!
//! Every persisted collection is a single JSON array stored under one string
//! key. Backends only move bytes; encoding lives in [`json`].

pub mod json;
mod memory;
mod sqlite;

pub use json::{load_collection, save_collection, update_collection};
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::error::Result;

/// Trait for key-value storage backends.
///
/// No transactions span more than one call; concurrent writers to the same
/// key are last writer wins.
pub trait KeyValueStore: Send + Sync {
  /// Read the raw value stored under `key`.
  fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

  /// Replace the value stored under `key`.
  fn write(&self, key: &str, value: &[u8]) -> Result<()>;

  /// Remove `key`. Missing keys are ignored.
  fn remove(&self, key: &str) -> Result<()>;

  /// All keys starting with `prefix`, sorted.
  fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}
