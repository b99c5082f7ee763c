//! Generic store for disputes and issues.
//!
//! Both namespaces share one implementation; a [`TicketKind`] supplies the
//! storage prefix and the category set.

use std::marker::PhantomData;
use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::error::{Result, StoreError};
use crate::model::{
  newest_id, next_id_after, Attachment, Message, Sender, Ticket, TicketKind, TicketStatus,
};
use crate::storage::{load_collection, update_collection, KeyValueStore};
use crate::thread::{MessageStore, NewMessage, ThreadKey};

pub type TicketOf<K> = Ticket<<K as TicketKind>::Category>;

/// Tickets for jobs, plus the message thread each ticket owns.
pub struct TicketStore<K: TicketKind> {
  storage: Arc<dyn KeyValueStore>,
  clock: Arc<dyn Clock>,
  messages: MessageStore,
  _kind: PhantomData<K>,
}

impl<K: TicketKind> Clone for TicketStore<K> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      clock: Arc::clone(&self.clock),
      messages: self.messages.clone(),
      _kind: PhantomData,
    }
  }
}

impl<K: TicketKind> TicketStore<K> {
  /// Create a ticket store whose threads follow `messages`' edit rules.
  pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, messages: MessageStore) -> Self {
    Self {
      storage,
      clock,
      messages,
      _kind: PhantomData,
    }
  }

  /// Storage key of a job's ticket list.
  pub fn tickets_key(job_id: &str) -> String {
    format!("{}_{}", K::STORAGE_PREFIX, job_id)
  }

  /// Thread owned by a ticket.
  pub fn thread_key(ticket_id: &str) -> ThreadKey {
    ThreadKey::ticket::<K>(ticket_id)
  }

  pub async fn list_tickets(&self, job_id: &str) -> Result<Vec<TicketOf<K>>> {
    load_collection(self.storage.as_ref(), &Self::tickets_key(job_id))
  }

  /// Largest ticket id across every job of this kind.
  ///
  /// Ticket threads are keyed by ticket id alone, so ids must not repeat
  /// between jobs.
  fn newest_ticket_id(&self) -> Result<Option<i64>> {
    let lists = format!("{}_", K::STORAGE_PREFIX);
    let threads = format!("{}_messages_", K::STORAGE_PREFIX);

    let mut newest = None;
    for key in self.storage.keys(&lists)? {
      if key.starts_with(&threads) {
        continue;
      }
      let tickets: Vec<TicketOf<K>> = load_collection(self.storage.as_ref(), &key)?;
      newest = newest.max(newest_id(&tickets));
    }
    Ok(newest)
  }

  /// Open a new ticket against a job.
  ///
  /// The category is already constrained by its type; the title is stored
  /// as given.
  pub async fn create_ticket(
    &self,
    job_id: &str,
    category: K::Category,
    title: &str,
  ) -> Result<TicketOf<K>> {
    let now = self.clock.now();
    let newest = self.newest_ticket_id()?;
    let ticket = update_collection(
      self.storage.as_ref(),
      &Self::tickets_key(job_id),
      |tickets: &mut Vec<TicketOf<K>>| {
        let ticket = Ticket {
          id: next_id_after::<TicketOf<K>>(newest.max(newest_id(tickets)), now),
          job_id: job_id.to_string(),
          category,
          title: title.to_string(),
          status: TicketStatus::Open,
          created_at: now,
        };
        tickets.push(ticket.clone());
        Ok(ticket)
      },
    )?;

    info!(
      kind = K::LABEL,
      job_id,
      id = %ticket.id,
      category = ?ticket.category,
      "Ticket opened"
    );
    Ok(ticket)
  }

  /// Move a ticket between open and resolved.
  pub async fn set_status(
    &self,
    job_id: &str,
    ticket_id: &str,
    status: TicketStatus,
  ) -> Result<TicketOf<K>> {
    let ticket = update_collection(
      self.storage.as_ref(),
      &Self::tickets_key(job_id),
      |tickets: &mut Vec<TicketOf<K>>| {
        let ticket = tickets
          .iter_mut()
          .find(|t| t.id == ticket_id)
          .ok_or_else(|| StoreError::TicketNotFound {
            id: ticket_id.to_string(),
          })?;
        ticket.status = status;
        Ok(ticket.clone())
      },
    )?;

    info!(kind = K::LABEL, job_id, id = ticket_id, %status, "Ticket status changed");
    Ok(ticket)
  }

  pub async fn list_messages(&self, ticket_id: &str) -> Result<Vec<Message>> {
    self.messages.list(&Self::thread_key(ticket_id)).await
  }

  pub async fn add_message(
    &self,
    ticket_id: &str,
    content: &str,
    sender: Sender,
    attachments: Vec<Attachment>,
  ) -> Result<Message> {
    self
      .messages
      .create(
        &Self::thread_key(ticket_id),
        NewMessage::new(sender, content).with_attachments(attachments),
      )
      .await
  }

  pub async fn edit_message(&self, ticket_id: &str, id: &str, content: &str) -> Result<Message> {
    self
      .messages
      .edit(&Self::thread_key(ticket_id), id, content)
      .await
  }

  pub async fn delete_message(&self, ticket_id: &str, id: &str) -> Result<()> {
    self.messages.delete(&Self::thread_key(ticket_id), id).await
  }
}
