//! Collection subscriptions backed by the [`QueryClient`].
//!
//! A `Query<T>` watches one cached collection. It fetches through the
//! client (so identical reads are shared), exposes loading/success/error
//! state, and refetches on its own once a mutation invalidates its key.
//!
//! # Example
//!
//! ```ignore
//! let mut query = desk.chat("chat-messages").messages();
//!
//! // Start fetching
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render; empty while the first fetch is in flight
//! for message in query.data() {
//!     render_message(message);
//! }
//! ```

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::client::QueryClient;
use super::key::QueryKey;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type FetchResult<T> = Result<Arc<Vec<T>>, String>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<T>, String>> + Send + Sync>;

/// Subscription to one cached collection.
pub struct Query<T> {
  client: QueryClient,
  key: QueryKey,
  state: QueryState<Arc<Vec<T>>>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<FetchResult<T>>>,
  version: watch::Receiver<u64>,
}

impl<T: Send + Sync + 'static> Query<T> {
  /// Create a new query for `key`.
  ///
  /// The fetcher is called each time the cache has no fresh data for the
  /// key when `fetch()` or `refetch()` runs.
  pub fn new<F, Fut, E>(client: QueryClient, key: QueryKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, E>> + Send + 'static,
    E: std::fmt::Display + 'static,
  {
    let version = client.subscribe(&key);
    Self {
      client,
      key,
      state: QueryState::Idle,
      fetcher: Arc::new(move || -> BoxFuture<'static, Result<Vec<T>, String>> {
        let fut = fetcher();
        Box::pin(async move { fut.await.map_err(|e| e.to_string()) })
      }),
      receiver: None,
      version,
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<Arc<Vec<T>>> {
    &self.state
  }

  /// The collection, or an empty slice until the first fetch succeeds.
  ///
  /// While a refetch runs the previous data stays visible.
  pub fn data(&self) -> &[T] {
    match &self.state {
      QueryState::Success(data) => data.as_slice(),
      _ => &[],
    }
  }

  /// Check if the query is currently loading.
  pub fn is_loading(&self) -> bool {
    self.receiver.is_some()
  }

  /// Check if the query failed.
  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Get the error message if the query failed.
  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start fetching data if not already loading.
  ///
  /// This is a no-op if the query is already loading.
  pub fn fetch(&mut self) {
    if self.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, dropping any pending result.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start_fetch();
  }

  /// Poll for results and invalidations.
  ///
  /// Returns `true` if the state changed or a refetch was scheduled.
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let mut changed = self.poll_invalidation();

    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return changed,
    };

    // Try to receive without blocking
    match receiver.try_recv() {
      Ok(result) => {
        self.apply(result);
        changed = true;
      }
      Err(mpsc::error::TryRecvError::Empty) => {}
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.apply(Err("Query was cancelled".to_string()));
        changed = true;
      }
    }
    changed
  }

  /// Wait until no fetch is pending, including refetches scheduled because
  /// the key was invalidated while a read was in flight.
  pub async fn settled(&mut self) {
    while let Some(rx) = self.receiver.as_mut() {
      let result = rx
        .recv()
        .await
        .unwrap_or_else(|| Err("Query was cancelled".to_string()));
      self.apply(result);
    }
  }

  /// Wait for the next invalidation or write of this key, then fetch and
  /// settle.
  pub async fn next_update(&mut self) {
    if self.version.changed().await.is_ok() {
      self.on_version_change();
    }
    self.settled().await;
  }

  fn poll_invalidation(&mut self) -> bool {
    if !self.version.has_changed().unwrap_or(false) {
      return false;
    }
    self.version.borrow_and_update();
    self.on_version_change()
  }

  /// Pick up another subscriber's read, or refetch after an invalidation.
  fn on_version_change(&mut self) -> bool {
    if self.is_loading() {
      return false;
    }
    if self.client.is_fresh(&self.key) {
      // Another subscriber already refetched
      if let Some(data) = self.client.get_cached::<Vec<T>>(&self.key) {
        self.state = QueryState::Success(data);
        return true;
      }
      return false;
    }
    if matches!(self.state, QueryState::Idle) {
      return false;
    }
    self.start_fetch();
    true
  }

  fn apply(&mut self, result: FetchResult<T>) {
    self.receiver = None;
    // Our own write to the cache bumped the version; that is not news
    self.version.borrow_and_update();
    match result {
      Ok(data) => {
        self.state = QueryState::Success(data);
        // Invalidated while in flight: the read predates the write
        if !self.client.is_fresh(&self.key) {
          self.start_fetch();
        }
      }
      Err(e) => self.state = QueryState::Error(e),
    }
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    if !self.state.is_success() {
      self.state = QueryState::Loading;
    }

    let client = self.client.clone();
    let key = self.key.clone();
    let fetcher = Arc::clone(&self.fetcher);
    tokio::spawn(async move {
      let result = client.fetch(&key, || fetcher()).await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}
