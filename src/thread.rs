//! Message threads: ordered sequences of messages under one storage key.

use chrono::Duration;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{Result, StoreError};
use crate::model::{next_id, Attachment, Message, ReplyTo, Sender, TicketKind};
use crate::storage::{load_collection, update_collection, KeyValueStore};

/// Default time after creation during which a message may still be edited.
pub fn default_edit_window() -> Duration {
  Duration::minutes(30)
}

/// Identifies one thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreadKey {
  /// Free-form chat thread, stored under `messages_<name>`
  Chat(String),
  /// Thread owned by a ticket, stored under `<prefix>_messages_<id>`
  Ticket { prefix: &'static str, id: String },
}

impl ThreadKey {
  pub fn chat(name: impl Into<String>) -> Self {
    Self::Chat(name.into())
  }

  pub fn ticket<K: TicketKind>(id: impl Into<String>) -> Self {
    Self::Ticket {
      prefix: K::STORAGE_PREFIX,
      id: id.into(),
    }
  }

  /// Key of the persisted array.
  pub fn storage_key(&self) -> String {
    match self {
      Self::Chat(name) => format!("messages_{}", name),
      Self::Ticket { prefix, id } => format!("{}_messages_{}", prefix, id),
    }
  }
}

impl fmt::Display for ThreadKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.storage_key())
  }
}

/// A message about to be created.
#[derive(Debug, Clone)]
pub struct NewMessage {
  pub content: String,
  pub sender: Sender,
  pub attachments: Vec<Attachment>,
  pub reply_to: Option<ReplyTo>,
}

impl NewMessage {
  pub fn new(sender: Sender, content: impl Into<String>) -> Self {
    Self {
      content: content.into(),
      sender,
      attachments: Vec::new(),
      reply_to: None,
    }
  }

  pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
    self.attachments = attachments;
    self
  }

  pub fn replying_to(mut self, reply_to: Option<ReplyTo>) -> Self {
    self.reply_to = reply_to;
    self
  }
}

/// Store for message threads.
///
/// Every mutation reads the whole thread, changes it in memory and writes
/// the whole thread back.
#[derive(Clone)]
pub struct MessageStore {
  storage: Arc<dyn KeyValueStore>,
  clock: Arc<dyn Clock>,
  edit_window: Option<Duration>,
}

impl MessageStore {
  /// Create a store with the default 30 minute edit window.
  pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
    Self {
      storage,
      clock,
      edit_window: Some(default_edit_window()),
    }
  }

  /// Set the edit window. `None` lets messages be edited at any time.
  pub fn with_edit_window(mut self, edit_window: Option<Duration>) -> Self {
    self.edit_window = edit_window;
    self
  }

  /// All messages of a thread, in creation order.
  pub async fn list(&self, key: &ThreadKey) -> Result<Vec<Message>> {
    load_collection(self.storage.as_ref(), &key.storage_key())
  }

  /// Append a message to a thread.
  ///
  /// Content is not validated here; callers make sure a message carries
  /// text or attachments.
  pub async fn create(&self, key: &ThreadKey, new: NewMessage) -> Result<Message> {
    let now = self.clock.now();
    let message = update_collection(
      self.storage.as_ref(),
      &key.storage_key(),
      |messages: &mut Vec<Message>| {
        let message = Message {
          id: next_id(messages, now),
          content: new.content,
          sender: new.sender,
          timestamp: now,
          attachments: new.attachments,
          edited: false,
          reply_to: new.reply_to,
        };
        messages.push(message.clone());
        Ok(message)
      },
    )?;

    info!(thread = %key, id = %message.id, sender = %message.sender, "Message created");
    Ok(message)
  }

  /// Post an application-generated message. System messages carry no
  /// attachments and cannot be edited or deleted.
  pub async fn create_system_message(&self, key: &ThreadKey, content: &str) -> Result<Message> {
    self
      .create(key, NewMessage::new(Sender::System, content))
      .await
  }

  /// Replace the content of a message and flag it as edited.
  pub async fn edit(&self, key: &ThreadKey, id: &str, content: &str) -> Result<Message> {
    let now = self.clock.now();
    let edit_window = self.edit_window;

    let result = update_collection(
      self.storage.as_ref(),
      &key.storage_key(),
      |messages: &mut Vec<Message>| {
        let message = messages
          .iter_mut()
          .find(|m| m.id == id)
          .ok_or(StoreError::NotFound)?;

        if message.is_system() {
          return Err(StoreError::ReadOnly);
        }
        if let Some(window) = edit_window {
          if now - message.timestamp > window {
            return Err(StoreError::EditWindowExpired);
          }
        }

        message.content = content.to_string();
        message.edited = true;
        Ok(message.clone())
      },
    );

    match &result {
      Ok(_) => info!(thread = %key, id, "Message edited"),
      Err(e) => warn!(thread = %key, id, "Edit rejected: {}", e),
    }
    result
  }

  /// Remove a message. Unknown ids are ignored.
  pub async fn delete(&self, key: &ThreadKey, id: &str) -> Result<()> {
    let removed = update_collection(
      self.storage.as_ref(),
      &key.storage_key(),
      |messages: &mut Vec<Message>| {
        let Some(position) = messages.iter().position(|m| m.id == id) else {
          return Ok(false);
        };
        if messages[position].is_system() {
          return Err(StoreError::ReadOnly);
        }
        messages.remove(position);
        Ok(true)
      },
    )?;

    if removed {
      info!(thread = %key, id, "Message deleted");
    }
    Ok(())
  }
}
