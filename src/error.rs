//! Error type shared by the storage adapter, entity stores and desk.

/// Errors raised by stores and the desk.
///
/// The cache layer never translates these; whatever invoked a mutation gets
/// the store's error back unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("Message not found")]
  NotFound,

  #[error("Message can no longer be edited")]
  EditWindowExpired,

  #[error("System messages cannot be changed")]
  ReadOnly,

  #[error("Ticket not found: {id}")]
  TicketNotFound { id: String },

  #[error("Failed to decode stored value at {key}: {source}")]
  Decode {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("Failed to encode value: {0}")]
  Encode(#[source] serde_json::Error),

  #[error("Storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  #[error("Failed to prepare storage location: {0}")]
  Io(#[from] std::io::Error),

  #[error("Lock poisoned: {0}")]
  Poisoned(String),

  #[error("{0}")]
  Validation(String),

  #[error("Job is already {status}")]
  JobClosed { status: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
  fn from(e: std::sync::PoisonError<T>) -> Self {
    StoreError::Poisoned(e.to_string())
  }
}
