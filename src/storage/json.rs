//! JSON encoding of whole collections.

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::KeyValueStore;
use crate::error::{Result, StoreError};

/// Load the array stored under `key`.
///
/// An absent key is an empty collection. Malformed JSON is reported as
/// [`StoreError::Decode`].
pub fn load_collection<T, S>(storage: &S, key: &str) -> Result<Vec<T>>
where
  T: DeserializeOwned,
  S: KeyValueStore + ?Sized,
{
  let Some(raw) = storage.read(key)? else {
    return Ok(Vec::new());
  };

  let items: Vec<T> = serde_json::from_slice(&raw).map_err(|source| StoreError::Decode {
    key: key.to_string(),
    source,
  })?;
  debug!(key, count = items.len(), "Loaded collection");
  Ok(items)
}

/// Replace the array stored under `key` with `items`.
pub fn save_collection<T, S>(storage: &S, key: &str, items: &[T]) -> Result<()>
where
  T: Serialize,
  S: KeyValueStore + ?Sized,
{
  let data = serde_json::to_vec(items).map_err(StoreError::Encode)?;
  storage.write(key, &data)?;
  debug!(key, count = items.len(), "Saved collection");
  Ok(())
}

/// Read the whole collection under `key`, let `f` change it, write it back.
///
/// The write only happens when `f` succeeds. Not atomic across processes
/// sharing one backend; the last writer wins.
pub fn update_collection<T, S, R, F>(storage: &S, key: &str, f: F) -> Result<R>
where
  T: Serialize + DeserializeOwned,
  S: KeyValueStore + ?Sized,
  F: FnOnce(&mut Vec<T>) -> Result<R>,
{
  let mut items = load_collection(storage, key)?;
  let out = f(&mut items)?;
  save_collection(storage, key, &items)?;
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStorage;

  #[test]
  fn test_absent_key_is_empty() {
    let storage = MemoryStorage::new();
    let items: Vec<String> = load_collection(&storage, "missing").unwrap();
    assert!(items.is_empty());
  }

  #[test]
  fn test_save_then_load_preserves_order() {
    let storage = MemoryStorage::new();
    save_collection(&storage, "k", &["b", "a", "c"]).unwrap();
    let items: Vec<String> = load_collection(&storage, "k").unwrap();
    assert_eq!(items, vec!["b", "a", "c"]);
  }

  #[test]
  fn test_failed_update_does_not_write() {
    let storage = MemoryStorage::new();
    save_collection(&storage, "k", &[1, 2]).unwrap();

    let result = update_collection(&storage, "k", |items: &mut Vec<i32>| {
      items.clear();
      Err::<(), _>(StoreError::NotFound)
    });
    assert!(matches!(result, Err(StoreError::NotFound)));

    let items: Vec<i32> = load_collection(&storage, "k").unwrap();
    assert_eq!(items, vec![1, 2]);
  }

  #[test]
  fn test_malformed_json_is_decode_error() {
    let storage = MemoryStorage::new();
    storage.write("k", b"{not json").unwrap();
    let err = load_collection::<String, _>(&storage, "k").unwrap_err();
    assert!(matches!(err, StoreError::Decode { ref key, .. } if key == "k"));
  }
}
