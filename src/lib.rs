//! Job collaboration threads, disputes and issues over a local key-value store.
//!
//! Layers, leaf first:
//! - [`storage`]: key-value backends and JSON collection encoding
//! - [`thread`] and [`tickets`]: entity stores doing whole-collection
//!   read-modify-write
//! - [`cache`]: query cache with deduplicated reads and invalidation
//! - [`desk`]: handles that front ends call into

pub mod attachments;
pub mod cache;
pub mod clock;
pub mod config;
pub mod desk;
pub mod error;
pub mod logging;
pub mod model;
pub mod storage;
pub mod thread;
pub mod tickets;

pub use desk::{Desk, DeskSettings, ThreadHandle, TicketBoard};
pub use error::{Result, StoreError};
