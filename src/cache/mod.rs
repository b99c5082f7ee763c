//! Query cache sitting between callers and the entity stores.
//!
//! This module provides:
//! - Composite cache keys (namespace + entity id)
//! - A client holding the latest successful read per key, with a freshness flag
//! - Deduplication of concurrent identical reads
//! - Subscriptions that refetch after a mutation invalidates their key

mod client;
mod key;
mod mutation;
mod query;

pub use client::QueryClient;
pub use key::QueryKey;
pub use mutation::Mutation;
pub use query::{Query, QueryState};
