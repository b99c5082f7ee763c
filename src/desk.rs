//! Caller-facing handles binding the stores to the query cache.
//!
//! Each handle owns the reads and writes for one collection: reads go
//! through the shared [`QueryClient`], writes are [`Mutation`]s that
//! invalidate the collection they touched. Input is validated here, before
//! it reaches a store.

use chrono::Duration;
use std::sync::Arc;
use tracing::info;

use crate::cache::{Mutation, Query, QueryClient, QueryKey};
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StoreError};
use crate::model::{
  Attachment, Disputes, Issues, Job, Message, ReplyTo, Sender, TicketKind, TicketStatus,
};
use crate::storage::{KeyValueStore, MemoryStorage};
use crate::thread::{default_edit_window, MessageStore, NewMessage, ThreadKey};
use crate::tickets::{TicketOf, TicketStore};

/// Job chat thread used when none is named.
pub const DEFAULT_CHAT_THREAD: &str = "chat-messages";

/// Posted to the job chat when the client completes a job.
pub const COMPLETION_NOTICE: &str =
  "🎉 Project has been completed and verified by the client! Thank you for your work.";

/// Knobs for a [`Desk`].
#[derive(Debug, Clone, Copy)]
pub struct DeskSettings {
  /// `None` lets messages be edited at any time
  pub edit_window: Option<Duration>,
  /// Sender recorded on messages written through this desk
  pub participant: Sender,
}

impl Default for DeskSettings {
  fn default() -> Self {
    Self {
      edit_window: Some(default_edit_window()),
      participant: Sender::User,
    }
  }
}

/// Entry point for front ends: one cache shared by every handle.
#[derive(Clone)]
pub struct Desk {
  client: QueryClient,
  storage: Arc<dyn KeyValueStore>,
  messages: MessageStore,
  disputes: TicketStore<Disputes>,
  issues: TicketStore<Issues>,
  participant: Sender,
}

impl Desk {
  pub fn new(storage: Arc<dyn KeyValueStore>, settings: DeskSettings) -> Self {
    Self::with_clock(storage, settings, Arc::new(SystemClock))
  }

  pub fn with_clock(
    storage: Arc<dyn KeyValueStore>,
    settings: DeskSettings,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let messages =
      MessageStore::new(storage.clone(), clock.clone()).with_edit_window(settings.edit_window);
    Self {
      client: QueryClient::new(),
      disputes: TicketStore::new(storage.clone(), clock.clone(), messages.clone()),
      issues: TicketStore::new(storage.clone(), clock, messages.clone()),
      storage,
      messages,
      participant: settings.participant,
    }
  }

  /// Desk over storage that disappears with the process.
  pub fn in_memory(settings: DeskSettings) -> Self {
    Self::new(Arc::new(MemoryStorage::new()), settings)
  }

  pub fn client(&self) -> &QueryClient {
    &self.client
  }

  pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
    &self.storage
  }

  pub fn chat(&self, name: &str) -> ThreadHandle {
    ThreadHandle::new(
      self.client.clone(),
      self.messages.clone(),
      ThreadKey::chat(name),
      QueryKey::messages(name),
      self.participant,
    )
  }

  pub fn disputes(&self, job_id: &str) -> TicketBoard<Disputes> {
    TicketBoard::new(self, self.disputes.clone(), job_id)
  }

  pub fn issues(&self, job_id: &str) -> TicketBoard<Issues> {
    TicketBoard::new(self, self.issues.clone(), job_id)
  }

  /// Announce completion in the job's chat thread.
  pub async fn complete_job(&self, job: &Job, thread: &str) -> Result<Message> {
    ensure_open(job)?;
    let message = self.chat(thread).post_system(COMPLETION_NOTICE).await?;
    info!(job = %job.do_shop_id, "Job completed");
    Ok(message)
  }

  pub async fn reject_job(&self, job: &Job) -> Result<()> {
    ensure_open(job)?;
    info!(job = %job.do_shop_id, "Job rejected");
    Ok(())
  }
}

fn ensure_open(job: &Job) -> Result<()> {
  if job.is_closed() {
    return Err(StoreError::JobClosed {
      status: job.project_status.to_lowercase(),
    });
  }
  Ok(())
}

fn validate_message(content: &str, attachments: &[Attachment]) -> Result<()> {
  if content.trim().is_empty() && attachments.is_empty() {
    return Err(StoreError::Validation(
      "Message needs text or at least one attachment".to_string(),
    ));
  }
  Ok(())
}

// ============================================================================
// Threads
// ============================================================================

/// Reads and writes for one message thread (job chat or ticket thread).
pub struct ThreadHandle {
  client: QueryClient,
  store: MessageStore,
  key: ThreadKey,
  query_key: QueryKey,
  participant: Sender,
  send: Mutation<NewMessage, Message>,
  system: Mutation<String, Message>,
  edit: Mutation<(String, String), Message>,
  delete: Mutation<String, ()>,
}

impl ThreadHandle {
  fn new(
    client: QueryClient,
    store: MessageStore,
    key: ThreadKey,
    query_key: QueryKey,
    participant: Sender,
  ) -> Self {
    let send = {
      let (store, key) = (store.clone(), key.clone());
      Mutation::new(client.clone(), move |new: NewMessage| {
        let (store, key) = (store.clone(), key.clone());
        async move { store.create(&key, new).await }
      })
      .invalidates(query_key.clone())
    };

    let system = {
      let (store, key) = (store.clone(), key.clone());
      Mutation::new(client.clone(), move |content: String| {
        let (store, key) = (store.clone(), key.clone());
        async move { store.create_system_message(&key, &content).await }
      })
      .invalidates(query_key.clone())
    };

    let edit = {
      let (store, key) = (store.clone(), key.clone());
      Mutation::new(client.clone(), move |(id, content): (String, String)| {
        let (store, key) = (store.clone(), key.clone());
        async move { store.edit(&key, &id, &content).await }
      })
      .invalidates(query_key.clone())
    };

    let delete = {
      let (store, key) = (store.clone(), key.clone());
      Mutation::new(client.clone(), move |id: String| {
        let (store, key) = (store.clone(), key.clone());
        async move { store.delete(&key, &id).await }
      })
      .invalidates(query_key.clone())
    };

    Self {
      client,
      store,
      key,
      query_key,
      participant,
      send,
      system,
      edit,
      delete,
    }
  }

  pub fn key(&self) -> &ThreadKey {
    &self.key
  }

  /// Subscription to the thread's messages.
  pub fn messages(&self) -> Query<Message> {
    let (store, key) = (self.store.clone(), self.key.clone());
    Query::new(self.client.clone(), self.query_key.clone(), move || {
      let (store, key) = (store.clone(), key.clone());
      async move { store.list(&key).await }
    })
  }

  /// Read the thread once, through the cache.
  pub async fn load(&self) -> Result<Arc<Vec<Message>>> {
    self
      .client
      .fetch(&self.query_key, || self.store.list(&self.key))
      .await
  }

  pub async fn send(&self, content: &str, attachments: Vec<Attachment>) -> Result<Message> {
    self.reply(content, attachments, None).await
  }

  /// Send a message quoting `reply_to`.
  pub async fn reply(
    &self,
    content: &str,
    attachments: Vec<Attachment>,
    reply_to: Option<ReplyTo>,
  ) -> Result<Message> {
    validate_message(content, &attachments)?;
    let new = NewMessage::new(self.participant, content)
      .with_attachments(attachments)
      .replying_to(reply_to);
    self.send.mutate(new).await
  }

  pub async fn post_system(&self, content: &str) -> Result<Message> {
    validate_message(content, &[])?;
    self.system.mutate(content.to_string()).await
  }

  pub async fn edit(&self, id: &str, content: &str) -> Result<Message> {
    validate_message(content, &[])?;
    self.edit.mutate((id.to_string(), content.to_string())).await
  }

  pub async fn delete(&self, id: &str) -> Result<()> {
    self.delete.mutate(id.to_string()).await
  }
}

// ============================================================================
// Tickets
// ============================================================================

/// Reads and writes for one kind of ticket on one job.
pub struct TicketBoard<K: TicketKind> {
  client: QueryClient,
  store: TicketStore<K>,
  messages: MessageStore,
  participant: Sender,
  job_id: String,
  query_key: QueryKey,
  open: Mutation<(K::Category, String), TicketOf<K>>,
  set_status: Mutation<(String, TicketStatus), TicketOf<K>>,
}

impl<K: TicketKind> TicketBoard<K> {
  fn new(desk: &Desk, store: TicketStore<K>, job_id: &str) -> Self {
    let client = desk.client.clone();
    let query_key = QueryKey::tickets::<K>(job_id);

    let open = {
      let (store, job_id) = (store.clone(), job_id.to_string());
      Mutation::new(client.clone(), move |(category, title): (K::Category, String)| {
        let (store, job_id) = (store.clone(), job_id.clone());
        async move { store.create_ticket(&job_id, category, &title).await }
      })
      .invalidates(query_key.clone())
    };

    let set_status = {
      let (store, job_id) = (store.clone(), job_id.to_string());
      Mutation::new(client.clone(), move |(id, status): (String, TicketStatus)| {
        let (store, job_id) = (store.clone(), job_id.clone());
        async move { store.set_status(&job_id, &id, status).await }
      })
      .invalidates(query_key.clone())
    };

    Self {
      client,
      store,
      messages: desk.messages.clone(),
      participant: desk.participant,
      job_id: job_id.to_string(),
      query_key,
      open,
      set_status,
    }
  }

  pub fn job_id(&self) -> &str {
    &self.job_id
  }

  /// Subscription to the job's tickets.
  pub fn tickets(&self) -> Query<TicketOf<K>> {
    let (store, job_id) = (self.store.clone(), self.job_id.clone());
    Query::new(self.client.clone(), self.query_key.clone(), move || {
      let (store, job_id) = (store.clone(), job_id.clone());
      async move { store.list_tickets(&job_id).await }
    })
  }

  pub async fn load(&self) -> Result<Arc<Vec<TicketOf<K>>>> {
    self
      .client
      .fetch(&self.query_key, || self.store.list_tickets(&self.job_id))
      .await
  }

  /// Open a ticket. The title is trimmed and must not be blank.
  pub async fn open(&self, category: K::Category, title: &str) -> Result<TicketOf<K>> {
    let title = title.trim();
    if title.is_empty() {
      return Err(StoreError::Validation(format!(
        "A {} needs a title",
        K::LABEL
      )));
    }
    self.open.mutate((category, title.to_string())).await
  }

  pub async fn resolve(&self, ticket_id: &str) -> Result<TicketOf<K>> {
    self
      .set_status
      .mutate((ticket_id.to_string(), TicketStatus::Resolved))
      .await
  }

  pub async fn reopen(&self, ticket_id: &str) -> Result<TicketOf<K>> {
    self
      .set_status
      .mutate((ticket_id.to_string(), TicketStatus::Open))
      .await
  }

  /// The message thread owned by a ticket.
  pub fn thread(&self, ticket_id: &str) -> ThreadHandle {
    ThreadHandle::new(
      self.client.clone(),
      self.messages.clone(),
      TicketStore::<K>::thread_key(ticket_id),
      QueryKey::ticket_messages::<K>(ticket_id),
      self.participant,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::testing::ManualClock;
  use crate::model::{AttachmentKind, DisputeCategory, IssueCategory};

  fn desk() -> (Desk, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at(1_714_557_600_000));
    let desk = Desk::with_clock(
      Arc::new(MemoryStorage::new()),
      DeskSettings::default(),
      clock.clone(),
    );
    (desk, clock)
  }

  fn job(status: &str) -> Job {
    serde_json::from_value(serde_json::json!({
      "do_shop_id": "shop-1",
      "business_name": "Tech Solutions Inc.",
      "business_email": "contact@techsolutions.com",
      "project_name": "Website Redesign",
      "project_description": "Complete redesign",
      "project_duration": "3 months",
      "project_type": "Web Development",
      "job_type": "Fixed Price",
      "project_status": status,
      "amount": "$5,000",
    }))
    .unwrap()
  }

  #[tokio::test]
  async fn test_send_invalidates_subscription() {
    let (desk, _) = desk();
    let chat = desk.chat(DEFAULT_CHAT_THREAD);
    let mut query = chat.messages();

    query.fetch();
    query.settled().await;
    assert!(query.data().is_empty());

    chat.send("hi", Vec::new()).await.unwrap();
    assert!(query.poll());
    query.settled().await;

    assert_eq!(query.data().len(), 1);
    assert_eq!(query.data()[0].content, "hi");
    assert_eq!(query.data()[0].sender, Sender::User);
  }

  #[tokio::test]
  async fn test_load_sees_edit_and_delete() {
    let (desk, _) = desk();
    let chat = desk.chat("k");

    let a = chat.send("hi", Vec::new()).await.unwrap();
    let b = chat.send("there", Vec::new()).await.unwrap();
    assert_eq!(chat.load().await.unwrap().len(), 2);

    chat.edit(&a.id, "bye").await.unwrap();
    chat.delete(&b.id).await.unwrap();

    let messages = chat.load().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "bye");
    assert!(messages[0].edited);
    assert_eq!(messages[0].timestamp, a.timestamp);
  }

  #[tokio::test]
  async fn test_chat_storage_layout() {
    let (desk, _) = desk();
    desk.chat("chat-messages").send("hi", Vec::new()).await.unwrap();
    assert!(desk
      .storage()
      .read("messages_chat-messages")
      .unwrap()
      .is_some());
  }

  #[tokio::test]
  async fn test_validation() {
    let (desk, _) = desk();
    let chat = desk.chat("k");

    assert!(matches!(
      chat.send("   ", Vec::new()).await,
      Err(StoreError::Validation(_))
    ));

    let attachment = Attachment {
      kind: AttachmentKind::File,
      url: "blob:jobdesk/1".to_string(),
      name: "brief.pdf".to_string(),
      preview: None,
    };
    let sent = chat.send("", vec![attachment]).await.unwrap();
    assert_eq!(sent.content, "");

    assert!(matches!(
      desk
        .disputes("j1")
        .open(DisputeCategory::Other, "  ")
        .await,
      Err(StoreError::Validation(_))
    ));
  }

  #[tokio::test]
  async fn test_failed_edit_surfaces_error() {
    let (desk, clock) = desk();
    let chat = desk.chat("k");
    let sent = chat.send("hi", Vec::new()).await.unwrap();

    assert!(matches!(
      chat.edit("missing", "x").await,
      Err(StoreError::NotFound)
    ));

    clock.advance(Duration::minutes(31));
    assert!(matches!(
      chat.edit(&sent.id, "late").await,
      Err(StoreError::EditWindowExpired)
    ));
    assert_eq!(chat.load().await.unwrap()[0].content, "hi");
  }

  #[tokio::test]
  async fn test_reply_snapshot() {
    let (desk, _) = desk();
    let chat = desk.chat("k");
    let question = chat.send("ready?", Vec::new()).await.unwrap();

    let answer = chat
      .reply("yes", Vec::new(), Some(ReplyTo::from(&question)))
      .await
      .unwrap();
    assert_eq!(answer.reply_to.unwrap().id, question.id);
  }

  #[tokio::test]
  async fn test_open_dispute_and_thread() {
    let (desk, _) = desk();
    let board = desk.disputes("j1");
    let mut tickets = board.tickets();
    tickets.fetch();
    tickets.settled().await;

    let dispute = board
      .open(DisputeCategory::PaymentDelay, "  Late pay ")
      .await
      .unwrap();
    assert!(tickets.poll());
    tickets.settled().await;
    assert_eq!(tickets.data().len(), 1);
    assert_eq!(tickets.data()[0].title, "Late pay");
    assert_eq!(tickets.data()[0].status, TicketStatus::Open);

    let thread = board.thread(&dispute.id);
    thread.send("where is my payment?", Vec::new()).await.unwrap();
    assert_eq!(thread.load().await.unwrap().len(), 1);
    assert!(board.thread("t2").load().await.unwrap().is_empty());

    board.resolve(&dispute.id).await.unwrap();
    assert_eq!(board.load().await.unwrap()[0].status, TicketStatus::Resolved);
    board.reopen(&dispute.id).await.unwrap();
    assert_eq!(board.load().await.unwrap()[0].status, TicketStatus::Open);
  }

  #[tokio::test]
  async fn test_issue_thread_cache_is_separate_from_disputes() {
    let (desk, _) = desk();
    desk
      .issues("j1")
      .open(IssueCategory::TechnicalProblem, "Build fails")
      .await
      .unwrap();

    assert_eq!(desk.issues("j1").load().await.unwrap().len(), 1);
    assert!(desk.disputes("j1").load().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_complete_job_posts_system_message() {
    let (desk, _) = desk();
    let message = desk
      .complete_job(&job("pending"), DEFAULT_CHAT_THREAD)
      .await
      .unwrap();
    assert_eq!(message.sender, Sender::System);
    assert_eq!(message.content, COMPLETION_NOTICE);

    let chat = desk.chat(DEFAULT_CHAT_THREAD);
    assert_eq!(chat.load().await.unwrap().len(), 1);
    assert!(matches!(
      chat.delete(&message.id).await,
      Err(StoreError::ReadOnly)
    ));
  }

  #[tokio::test]
  async fn test_in_memory_desk_uses_settings() {
    let desk = Desk::in_memory(DeskSettings {
      edit_window: None,
      participant: Sender::Client,
    });
    let sent = desk.chat("k").send("hello", Vec::new()).await.unwrap();
    assert_eq!(sent.sender, Sender::Client);
    assert_eq!(desk.storage().keys("messages_").unwrap(), vec!["messages_k"]);
  }

  #[tokio::test]
  async fn test_closed_job_rejects_actions() {
    let (desk, _) = desk();
    assert!(matches!(
      desk.complete_job(&job("Completed"), DEFAULT_CHAT_THREAD).await,
      Err(StoreError::JobClosed { .. })
    ));
    assert!(matches!(
      desk.reject_job(&job("rejected")).await,
      Err(StoreError::JobClosed { .. })
    ));
    desk.reject_job(&job("pending")).await.unwrap();
    assert!(desk
      .chat(DEFAULT_CHAT_THREAD)
      .load()
      .await
      .unwrap()
      .is_empty());
  }
}
