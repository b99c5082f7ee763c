use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{iso_millis, Record};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
  User,
  Client,
  Admin,
  /// Generated by the application; never editable or deletable
  System,
}

impl Sender {
  pub fn as_str(&self) -> &'static str {
    match self {
      Sender::User => "user",
      Sender::Client => "client",
      Sender::Admin => "admin",
      Sender::System => "system",
    }
  }
}

impl fmt::Display for Sender {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Sender {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "user" => Ok(Sender::User),
      "client" => Ok(Sender::Client),
      "admin" => Ok(Sender::Admin),
      "system" => Ok(Sender::System),
      other => Err(format!("unknown sender: {}", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
  File,
  Image,
}

/// A file or image attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
  #[serde(rename = "type")]
  pub kind: AttachmentKind,
  /// Process-local object URL; meaningless after the registry that minted it is gone
  pub url: String,
  pub name: String,
  /// Only set for images
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub preview: Option<String>,
}

/// Snapshot of the message being replied to, copied at reply time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTo {
  pub id: String,
  pub content: String,
  pub sender: Sender,
}

impl From<&Message> for ReplyTo {
  fn from(message: &Message) -> Self {
    Self {
      id: message.id.clone(),
      content: message.content.clone(),
      sender: message.sender,
    }
  }
}

/// A single entry in a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
  pub id: String,
  pub content: String,
  pub sender: Sender,
  #[serde(with = "iso_millis")]
  pub timestamp: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub attachments: Vec<Attachment>,
  #[serde(default)]
  pub edited: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reply_to: Option<ReplyTo>,
}

impl Message {
  pub fn is_system(&self) -> bool {
    self.sender == Sender::System
  }
}

impl Record for Message {
  fn record_id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "message"
  }
}
