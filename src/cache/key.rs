//! Composite cache keys.

use sha2::{Digest, Sha256};

use crate::model::TicketKind;

/// Identifies one cached collection: a namespace plus an entity id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryKey {
  /// A free-form chat thread
  Messages { storage_key: String },
  /// Tickets of one kind for a job
  Tickets { kind: &'static str, job_id: String },
  /// The thread owned by a ticket
  TicketMessages { kind: &'static str, ticket_id: String },
}

impl QueryKey {
  pub fn messages(storage_key: impl Into<String>) -> Self {
    Self::Messages {
      storage_key: storage_key.into(),
    }
  }

  pub fn tickets<K: TicketKind>(job_id: impl Into<String>) -> Self {
    Self::Tickets {
      kind: K::LABEL,
      job_id: job_id.into(),
    }
  }

  pub fn ticket_messages<K: TicketKind>(ticket_id: impl Into<String>) -> Self {
    Self::TicketMessages {
      kind: K::LABEL,
      ticket_id: ticket_id.into(),
    }
  }

  /// Stable, fixed-length id for the cache map.
  pub fn cache_hash(&self) -> String {
    let input = match self {
      Self::Messages { storage_key } => format!("messages:{}", storage_key),
      Self::Tickets { kind, job_id } => format!("{}s:{}", kind, job_id),
      Self::TicketMessages { kind, ticket_id } => format!("{}-messages:{}", kind, ticket_id),
    };

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  pub fn description(&self) -> String {
    match self {
      Self::Messages { storage_key } => format!("messages in {}", storage_key),
      Self::Tickets { kind, job_id } => format!("{}s for job {}", kind, job_id),
      Self::TicketMessages { kind, ticket_id } => format!("messages of {} {}", kind, ticket_id),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{Disputes, Issues};

  #[test]
  fn test_hash_is_stable_and_distinct() {
    let a = QueryKey::messages("chat-messages");
    assert_eq!(a.cache_hash(), QueryKey::messages("chat-messages").cache_hash());
    assert_eq!(a.cache_hash().len(), 64);

    let disputes = QueryKey::tickets::<Disputes>("j1");
    let issues = QueryKey::tickets::<Issues>("j1");
    assert_ne!(disputes.cache_hash(), issues.cache_hash());
    assert_ne!(
      QueryKey::tickets::<Disputes>("t1").cache_hash(),
      QueryKey::ticket_messages::<Disputes>("t1").cache_hash()
    );
  }

  #[test]
  fn test_description() {
    assert_eq!(
      QueryKey::ticket_messages::<Issues>("7").description(),
      "messages of issue 7"
    );
    assert_eq!(QueryKey::tickets::<Disputes>("j1").description(), "disputes for job j1");
  }
}
