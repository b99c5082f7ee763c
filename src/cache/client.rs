//! Cache client that deduplicates reads and tracks invalidations.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

use super::key::QueryKey;

type AnyData = Arc<dyn Any + Send + Sync>;

/// One cached collection.
struct Entry {
  /// Latest successful read
  data: Option<AnyData>,
  /// False until the first read, and again after every invalidation
  fresh: bool,
  fetched_at: Option<DateTime<Utc>>,
  /// Bumped on every invalidation; a read that overlaps one is stored but not fresh
  generation: u64,
  /// Bumped on every store and invalidation so subscribers can re-render
  version: watch::Sender<u64>,
  /// Serializes reads of this key
  fetch_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Entry {
  fn new() -> Self {
    let (version, _) = watch::channel(0);
    Self {
      data: None,
      fresh: false,
      fetched_at: None,
      generation: 0,
      version,
      fetch_lock: Arc::new(tokio::sync::Mutex::new(())),
    }
  }

  fn bump(&self) {
    self.version.send_modify(|v| *v += 1);
  }
}

/// Process-wide cache of collections keyed by [`QueryKey`].
///
/// Entries are created on first use and live as long as the client. Cloning
/// shares the same cache.
#[derive(Clone, Default)]
pub struct QueryClient {
  entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl QueryClient {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
    // Entries are updated in single steps, so a poisoned map is still consistent
    self.entries.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn with_entry<R>(&self, hash: &str, f: impl FnOnce(&mut Entry) -> R) -> R {
    let mut entries = self.lock();
    let entry = entries.entry(hash.to_string()).or_insert_with(Entry::new);
    f(entry)
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Fresh cached data is returned immediately
  /// 2. Otherwise wait for any read of the same key already in progress
  /// 3. If that read left fresh data, reuse it
  /// 4. Else run `fetcher` and cache its result
  ///
  /// Errors from `fetcher` are returned as-is and leave the entry untouched.
  pub async fn fetch<T, E, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, E>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let hash = key.cache_hash();

    if let Some(data) = self.fresh_data::<T>(&hash) {
      debug!(query = %key.description(), "Cache hit");
      return Ok(data);
    }

    let fetch_lock = self.with_entry(&hash, |e| Arc::clone(&e.fetch_lock));
    let _guard = fetch_lock.lock().await;

    if let Some(data) = self.fresh_data::<T>(&hash) {
      debug!(query = %key.description(), "Reusing concurrent read");
      return Ok(data);
    }

    let generation = self.with_entry(&hash, |e| e.generation);
    debug!(query = %key.description(), "Fetching");
    let data = Arc::new(fetcher().await?);

    self.with_entry(&hash, |e| {
      e.data = Some(data.clone() as AnyData);
      e.fresh = e.generation == generation;
      e.fetched_at = Some(Utc::now());
      e.bump();
    });
    Ok(data)
  }

  fn fresh_data<T: Send + Sync + 'static>(&self, hash: &str) -> Option<Arc<T>> {
    let entries = self.lock();
    let entry = entries.get(hash)?;
    if !entry.fresh {
      return None;
    }
    entry.data.clone()?.downcast::<T>().ok()
  }

  /// Mark a key stale and notify its subscribers.
  pub fn invalidate(&self, key: &QueryKey) {
    let hash = key.cache_hash();
    self.with_entry(&hash, |e| {
      e.fresh = false;
      e.generation += 1;
      e.bump();
    });
    debug!(query = %key.description(), "Invalidated");
  }

  /// Latest cached data for a key, fresh or not.
  pub fn get_cached<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
    let entries = self.lock();
    entries
      .get(&key.cache_hash())?
      .data
      .clone()?
      .downcast::<T>()
      .ok()
  }

  pub fn is_fresh(&self, key: &QueryKey) -> bool {
    self
      .lock()
      .get(&key.cache_hash())
      .map(|e| e.fresh)
      .unwrap_or(false)
  }

  /// When the cached data for a key was last fetched.
  pub fn fetched_at(&self, key: &QueryKey) -> Option<DateTime<Utc>> {
    self.lock().get(&key.cache_hash())?.fetched_at
  }

  /// Receiver that changes whenever the key is re-fetched or invalidated.
  pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<u64> {
    self.with_entry(&key.cache_hash(), |e| e.version.subscribe())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  fn counting_fetch(
    counter: &Arc<AtomicU32>,
    value: Vec<u32>,
  ) -> impl Future<Output = Result<Vec<u32>, String>> {
    let counter = counter.clone();
    async move {
      counter.fetch_add(1, Ordering::SeqCst);
      tokio::time::sleep(Duration::from_millis(10)).await;
      Ok(value)
    }
  }

  #[tokio::test]
  async fn test_second_read_is_cached() {
    let client = QueryClient::new();
    let key = QueryKey::messages("k");
    let counter = Arc::new(AtomicU32::new(0));

    let first = client
      .fetch(&key, || counting_fetch(&counter, vec![1]))
      .await
      .unwrap();
    let second = client
      .fetch(&key, || counting_fetch(&counter, vec![2]))
      .await
      .unwrap();

    assert_eq!(*first, vec![1]);
    assert_eq!(*second, vec![1]);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(client.is_fresh(&key));
    assert!(client.fetched_at(&key).is_some());
  }

  #[tokio::test]
  async fn test_concurrent_reads_are_deduplicated() {
    let client = QueryClient::new();
    let key = QueryKey::messages("k");
    let counter = Arc::new(AtomicU32::new(0));

    let (a, b) = futures::join!(
      client.fetch(&key, || counting_fetch(&counter, vec![1])),
      client.fetch(&key, || counting_fetch(&counter, vec![2])),
    );

    assert_eq!(*a.unwrap(), vec![1]);
    assert_eq!(*b.unwrap(), vec![1]);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let client = QueryClient::new();
    let key = QueryKey::messages("k");
    let counter = Arc::new(AtomicU32::new(0));

    client
      .fetch(&key, || counting_fetch(&counter, vec![1]))
      .await
      .unwrap();

    let mut rx = client.subscribe(&key);
    client.invalidate(&key);
    assert!(rx.has_changed().unwrap());
    assert!(!client.is_fresh(&key));
    // Stale data stays readable until the refetch lands
    assert_eq!(*client.get_cached::<Vec<u32>>(&key).unwrap(), vec![1]);

    let data = client
      .fetch(&key, || counting_fetch(&counter, vec![2]))
      .await
      .unwrap();
    assert_eq!(*data, vec![2]);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_read_overlapping_invalidation_stays_stale() {
    let client = QueryClient::new();
    let key = QueryKey::messages("k");

    let data = client
      .fetch(&key, || {
        // A mutation lands while this read is in flight
        client.invalidate(&key);
        async { Ok::<_, String>(vec![1u32]) }
      })
      .await
      .unwrap();

    assert_eq!(*data, vec![1]);
    assert!(!client.is_fresh(&key));
  }

  #[tokio::test]
  async fn test_errors_pass_through_and_are_not_cached() {
    let client = QueryClient::new();
    let key = QueryKey::messages("k");

    let err = client
      .fetch(&key, || async { Err::<Vec<u32>, _>("boom".to_string()) })
      .await
      .unwrap_err();
    assert_eq!(err, "boom");
    assert!(client.get_cached::<Vec<u32>>(&key).is_none());
    assert!(!client.is_fresh(&key));
  }

  #[tokio::test]
  async fn test_keys_are_independent() {
    let client = QueryClient::new();
    let a = QueryKey::messages("a");
    let b = QueryKey::messages("b");

    client
      .fetch(&a, || async { Ok::<_, String>(vec![1u32]) })
      .await
      .unwrap();
    client.invalidate(&b);

    assert!(client.is_fresh(&a));
    assert!(client.get_cached::<Vec<u32>>(&b).is_none());
  }
}
