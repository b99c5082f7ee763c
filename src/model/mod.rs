//! Entity shapes persisted by the stores.

mod job;
mod message;
mod ticket;

pub use job::{Job, ProjectLink};
pub use message::{Attachment, AttachmentKind, Message, ReplyTo, Sender};
pub use ticket::{
  Category, Dispute, DisputeCategory, Disputes, Issue, IssueCategory, Issues, Ticket, TicketKind,
  TicketStatus,
};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

/// Trait for entities kept in a stored collection.
///
/// Implementors provide the id used to find them inside their collection.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Identifier unique within the owning collection.
  fn record_id(&self) -> &str;

  /// Entity type name for logs (e.g., "message", "ticket")
  fn entity_type() -> &'static str;
}

/// Id for a new record: creation time in epoch milliseconds, bumped past
/// the largest numeric id already in the collection so ids keep increasing
/// in creation order.
pub fn next_id<T: Record>(existing: &[T], now: DateTime<Utc>) -> String {
  next_id_after::<T>(newest_id(existing), now)
}

/// Largest numeric id in a collection. Non-numeric ids are ignored.
pub fn newest_id<T: Record>(existing: &[T]) -> Option<i64> {
  existing
    .iter()
    .filter_map(|r| r.record_id().parse::<i64>().ok())
    .max()
}

/// Like [`next_id`], for ids that must stay unique beyond one collection.
pub fn next_id_after<T: Record>(last: Option<i64>, now: DateTime<Utc>) -> String {
  let candidate = now.timestamp_millis();
  match last {
    Some(last) if last >= candidate => {
      debug!(entity = T::entity_type(), last, "Clock behind newest id, bumping");
      (last + 1).to_string()
    }
    _ => candidate.to_string(),
  }
}

/// ISO-8601 timestamps with millisecond precision and a `Z` suffix,
/// e.g. `2024-05-01T10:00:00.000Z`.
pub mod iso_millis {
  use chrono::{DateTime, SecondsFormat, Utc};
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
  }

  pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>,
  {
    let s = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&s)
      .map(|dt| dt.with_timezone(&Utc))
      .map_err(serde::de::Error::custom)
  }
}
