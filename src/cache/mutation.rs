//! Mutate-then-invalidate wrapper around store writes.

use futures::future::BoxFuture;
use std::future::Future;
use tracing::debug;

use super::client::QueryClient;
use super::key::QueryKey;
use crate::error::StoreError;

type MutationFn<A, R, E> = Box<dyn Fn(A) -> BoxFuture<'static, Result<R, E>> + Send + Sync>;

/// A write whose success invalidates a fixed set of cache keys.
///
/// Invalidation happens only after the write resolved. Nothing is applied
/// optimistically, and errors are returned untouched.
pub struct Mutation<A, R, E = StoreError> {
  client: QueryClient,
  mutation_fn: MutationFn<A, R, E>,
  invalidates: Vec<QueryKey>,
}

impl<A, R, E> Mutation<A, R, E>
where
  A: Send + 'static,
  R: Send + 'static,
  E: Send + 'static,
{
  pub fn new<F, Fut>(client: QueryClient, mutation_fn: F) -> Self
  where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
  {
    Self {
      client,
      mutation_fn: Box::new(move |args| -> BoxFuture<'static, Result<R, E>> {
        Box::pin(mutation_fn(args))
      }),
      invalidates: Vec::new(),
    }
  }

  /// Add a key to invalidate after every successful call.
  pub fn invalidates(mut self, key: QueryKey) -> Self {
    self.invalidates.push(key);
    self
  }

  /// Run the mutation, then invalidate on success.
  pub async fn mutate(&self, args: A) -> Result<R, E> {
    let out = (self.mutation_fn)(args).await?;
    for key in &self.invalidates {
      debug!(query = %key.description(), "Invalidating after mutation");
      self.client.invalidate(key);
    }
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_success_invalidates() {
    let client = QueryClient::new();
    let key = QueryKey::messages("k");
    client
      .fetch(&key, || async { Ok::<_, String>(vec![1u32]) })
      .await
      .unwrap();

    let mutation: Mutation<u32, u32, String> =
      Mutation::new(client.clone(), |n| async move { Ok(n * 2) }).invalidates(key.clone());

    assert_eq!(mutation.mutate(21).await.unwrap(), 42);
    assert!(!client.is_fresh(&key));
  }

  #[tokio::test]
  async fn test_failure_keeps_cache_fresh() {
    let client = QueryClient::new();
    let key = QueryKey::messages("k");
    client
      .fetch(&key, || async { Ok::<_, String>(vec![1u32]) })
      .await
      .unwrap();

    let mutation: Mutation<(), ()> =
      Mutation::new(client.clone(), |_| async { Err(StoreError::NotFound) })
        .invalidates(key.clone());

    assert!(matches!(mutation.mutate(()).await, Err(StoreError::NotFound)));
    assert!(client.is_fresh(&key));
  }
}
