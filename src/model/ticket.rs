//! Disputes and issues: categorized complaint threads attached to a job.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{iso_millis, Record};

/// Closed set of categories a ticket kind accepts.
pub trait Category:
  Copy
  + fmt::Debug
  + PartialEq
  + Send
  + Sync
  + Serialize
  + DeserializeOwned
  + FromStr<Err = String>
  + 'static
{
  /// Every variant, in display order.
  fn all() -> &'static [Self];

  /// Wire name (snake_case).
  fn as_str(&self) -> &'static str;

  /// Human-readable label.
  fn label(&self) -> &'static str;
}

/// Static configuration of one ticket namespace.
pub trait TicketKind: Send + Sync + 'static {
  type Category: Category;

  /// Prefix for the storage keys `<prefix>_<jobId>` and `<prefix>_messages_<id>`.
  const STORAGE_PREFIX: &'static str;

  /// Singular name for logs and messages.
  const LABEL: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
  Open,
  Resolved,
}

impl fmt::Display for TicketStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TicketStatus::Open => f.write_str("open"),
      TicketStatus::Resolved => f.write_str("resolved"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket<C> {
  pub id: String,
  pub job_id: String,
  pub category: C,
  pub title: String,
  pub status: TicketStatus,
  #[serde(with = "iso_millis")]
  pub created_at: DateTime<Utc>,
}

impl<C> Record for Ticket<C>
where
  C: Clone + Send + Sync + Serialize + DeserializeOwned,
{
  fn record_id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "ticket"
  }
}

// ============================================================================
// Disputes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeCategory {
  PaymentDelay,
  ScopeChange,
  QualityOfWork,
  MissedDeadline,
  Communication,
  Other,
}

impl Category for DisputeCategory {
  fn all() -> &'static [Self] {
    &[
      Self::PaymentDelay,
      Self::ScopeChange,
      Self::QualityOfWork,
      Self::MissedDeadline,
      Self::Communication,
      Self::Other,
    ]
  }

  fn as_str(&self) -> &'static str {
    match self {
      Self::PaymentDelay => "payment_delay",
      Self::ScopeChange => "scope_change",
      Self::QualityOfWork => "quality_of_work",
      Self::MissedDeadline => "missed_deadline",
      Self::Communication => "communication",
      Self::Other => "other",
    }
  }

  fn label(&self) -> &'static str {
    match self {
      Self::PaymentDelay => "Payment Delay",
      Self::ScopeChange => "Scope Change",
      Self::QualityOfWork => "Quality of Work",
      Self::MissedDeadline => "Missed Deadline",
      Self::Communication => "Communication Problems",
      Self::Other => "Other",
    }
  }
}

impl FromStr for DisputeCategory {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse_category(s)
  }
}

/// Marker for the dispute namespace.
pub struct Disputes;

impl TicketKind for Disputes {
  type Category = DisputeCategory;
  const STORAGE_PREFIX: &'static str = "dispute";
  const LABEL: &'static str = "dispute";
}

pub type Dispute = Ticket<DisputeCategory>;

// ============================================================================
// Issues
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
  PaymentDelay,
  TechnicalProblem,
  MissingInformation,
  AccessRequest,
  Communication,
  Other,
}

impl Category for IssueCategory {
  fn all() -> &'static [Self] {
    &[
      Self::PaymentDelay,
      Self::TechnicalProblem,
      Self::MissingInformation,
      Self::AccessRequest,
      Self::Communication,
      Self::Other,
    ]
  }

  fn as_str(&self) -> &'static str {
    match self {
      Self::PaymentDelay => "payment_delay",
      Self::TechnicalProblem => "technical_problem",
      Self::MissingInformation => "missing_information",
      Self::AccessRequest => "access_request",
      Self::Communication => "communication",
      Self::Other => "other",
    }
  }

  fn label(&self) -> &'static str {
    match self {
      Self::PaymentDelay => "Payment Delay",
      Self::TechnicalProblem => "Technical Problem",
      Self::MissingInformation => "Missing Information",
      Self::AccessRequest => "Access Request",
      Self::Communication => "Communication",
      Self::Other => "Other",
    }
  }
}

impl FromStr for IssueCategory {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse_category(s)
  }
}

/// Marker for the issue namespace.
pub struct Issues;

impl TicketKind for Issues {
  type Category = IssueCategory;
  const STORAGE_PREFIX: &'static str = "issue";
  const LABEL: &'static str = "issue";
}

pub type Issue = Ticket<IssueCategory>;

/// Match on wire name, accepting dashes for underscores.
fn parse_category<C: Category>(s: &str) -> Result<C, String> {
  let wanted = s.trim().to_lowercase().replace('-', "_");
  C::all()
    .iter()
    .copied()
    .find(|c| c.as_str() == wanted)
    .ok_or_else(|| {
      let names: Vec<&str> = C::all().iter().map(|c| c.as_str()).collect();
      format!("unknown category '{}' (expected one of: {})", s, names.join(", "))
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_category_wire_names_match_as_str() {
    for c in DisputeCategory::all() {
      assert_eq!(serde_json::to_value(c).unwrap(), c.as_str());
    }
    for c in IssueCategory::all() {
      assert_eq!(serde_json::to_value(c).unwrap(), c.as_str());
    }
  }

  #[test]
  fn test_parse_category() {
    assert_eq!(
      "payment-delay".parse::<DisputeCategory>().unwrap(),
      DisputeCategory::PaymentDelay
    );
    assert_eq!(
      "Access_Request".parse::<IssueCategory>().unwrap(),
      IssueCategory::AccessRequest
    );
    assert!("scope_change".parse::<IssueCategory>().is_err());
  }

  #[test]
  fn test_ticket_wire_format() {
    let dispute = Dispute {
      id: "1".to_string(),
      job_id: "j1".to_string(),
      category: DisputeCategory::PaymentDelay,
      title: "Late pay".to_string(),
      status: TicketStatus::Open,
      created_at: Utc.timestamp_millis_opt(0).unwrap(),
    };
    let json = serde_json::to_value(&dispute).unwrap();
    assert_eq!(json["jobId"], "j1");
    assert_eq!(json["category"], "payment_delay");
    assert_eq!(json["status"], "open");
    assert_eq!(json["createdAt"], "1970-01-01T00:00:00.000Z");

    let back: Dispute = serde_json::from_value(json).unwrap();
    assert_eq!(back, dispute);
  }
}
