use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jobdesk::attachments::AttachmentRegistry;
use jobdesk::config::Config;
use jobdesk::logging;
use jobdesk::model::{Category, Job, Message, ReplyTo, Ticket, TicketKind};
use jobdesk::storage::SqliteStorage;
use jobdesk::{Desk, ThreadHandle, TicketBoard};

#[derive(Parser, Debug)]
#[command(name = "jobdesk")]
#[command(about = "Job chat, disputes and issues kept in a local store")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jobdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Path to the store file, overriding the config
  #[arg(short, long)]
  store: Option<PathBuf>,

  /// Dry run: use a throwaway in-memory store, so nothing this command
  /// writes is kept after it exits
  #[arg(long, conflicts_with = "store")]
  memory: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Messages in a chat thread
  Chat {
    /// Thread name (default from config, usually "chat-messages")
    #[arg(short, long)]
    thread: Option<String>,

    #[command(subcommand)]
    action: ChatAction,
  },
  /// Disputes raised against a job
  Dispute {
    #[arg(short, long)]
    job: String,

    #[command(subcommand)]
    action: TicketAction,
  },
  /// Issues raised against a job
  Issue {
    #[arg(short, long)]
    job: String,

    #[command(subcommand)]
    action: TicketAction,
  },
  /// Complete or reject a job
  Job {
    #[command(subcommand)]
    action: JobAction,
  },
  /// List stored collection keys
  Keys {
    #[arg(default_value = "")]
    prefix: String,
  },
}

#[derive(Subcommand, Debug)]
enum ChatAction {
  List,
  Send {
    text: String,
    #[arg(short, long)]
    attach: Vec<PathBuf>,
    /// Id of the message being answered
    #[arg(short, long)]
    reply_to: Option<String>,
  },
  Edit {
    id: String,
    text: String,
  },
  Delete {
    id: String,
  },
  /// Post a system notice
  System {
    text: String,
  },
}

#[derive(Subcommand, Debug)]
enum TicketAction {
  List,
  /// Show the accepted categories
  Categories,
  Open {
    #[arg(short, long)]
    category: String,
    #[arg(short, long)]
    title: String,
  },
  Resolve {
    id: String,
  },
  Reopen {
    id: String,
  },
  /// Show a ticket's thread
  Messages {
    id: String,
  },
  Reply {
    id: String,
    text: String,
    #[arg(short, long)]
    attach: Vec<PathBuf>,
  },
  EditMessage {
    id: String,
    message_id: String,
    text: String,
  },
  DeleteMessage {
    id: String,
    message_id: String,
  },
}

#[derive(Subcommand, Debug)]
enum JobAction {
  Complete {
    /// YAML or JSON file describing the job
    #[arg(long)]
    job_file: PathBuf,
    #[arg(short, long)]
    thread: Option<String>,
  },
  Reject {
    #[arg(long)]
    job_file: PathBuf,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.logging)?;

  let desk = if args.memory {
    Desk::in_memory(config.desk_settings())
  } else {
    let path = args.store.as_deref().or(config.storage.path.as_deref());
    Desk::new(Arc::new(SqliteStorage::open(path)?), config.desk_settings())
  };

  match args.command {
    Command::Chat { thread, action } => {
      let thread = thread.unwrap_or_else(|| config.messages.default_thread.clone());
      run_chat(&desk.chat(&thread), action).await
    }
    Command::Dispute { job, action } => run_tickets(&desk.disputes(&job), action).await,
    Command::Issue { job, action } => run_tickets(&desk.issues(&job), action).await,
    Command::Job { action } => match action {
      JobAction::Complete { job_file, thread } => {
        let job = load_job(&job_file)?;
        let thread = thread.unwrap_or_else(|| config.messages.default_thread.clone());
        let message = desk.complete_job(&job, &thread).await?;
        print_message(&message);
        Ok(())
      }
      JobAction::Reject { job_file } => {
        let job = load_job(&job_file)?;
        desk.reject_job(&job).await?;
        println!("Job {} rejected", job.do_shop_id);
        Ok(())
      }
    },
    Command::Keys { prefix } => {
      for key in desk.storage().keys(&prefix)? {
        println!("{}", key);
      }
      Ok(())
    }
  }
}

async fn run_chat(thread: &ThreadHandle, action: ChatAction) -> Result<()> {
  match action {
    ChatAction::List => print_thread(thread).await?,
    ChatAction::Send {
      text,
      attach,
      reply_to,
    } => {
      let reply_to = match reply_to {
        Some(id) => {
          let messages = thread.load().await?;
          let original = messages
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| eyre!("No message {} in {}", id, thread.key()))?;
          Some(ReplyTo::from(original))
        }
        None => None,
      };
      let message = send_with_attachments(thread, &text, &attach, reply_to).await?;
      print_message(&message);
    }
    ChatAction::Edit { id, text } => print_message(&thread.edit(&id, &text).await?),
    ChatAction::Delete { id } => {
      thread.delete(&id).await?;
      println!("Deleted {}", id);
    }
    ChatAction::System { text } => print_message(&thread.post_system(&text).await?),
  }
  Ok(())
}

async fn run_tickets<K: TicketKind>(board: &TicketBoard<K>, action: TicketAction) -> Result<()> {
  match action {
    TicketAction::List => {
      let tickets = board.load().await?;
      if tickets.is_empty() {
        println!("No {}s for job {}", K::LABEL, board.job_id());
      }
      for ticket in tickets.iter() {
        print_ticket(ticket);
      }
    }
    TicketAction::Categories => {
      for category in K::Category::all() {
        println!("{:<20} {}", category.as_str(), category.label());
      }
    }
    TicketAction::Open { category, title } => {
      let category: K::Category = category.parse().map_err(|e: String| eyre!(e))?;
      print_ticket(&board.open(category, &title).await?);
    }
    TicketAction::Resolve { id } => print_ticket(&board.resolve(&id).await?),
    TicketAction::Reopen { id } => print_ticket(&board.reopen(&id).await?),
    TicketAction::Messages { id } => print_thread(&board.thread(&id)).await?,
    TicketAction::Reply { id, text, attach } => {
      let message = send_with_attachments(&board.thread(&id), &text, &attach, None).await?;
      print_message(&message);
    }
    TicketAction::EditMessage {
      id,
      message_id,
      text,
    } => print_message(&board.thread(&id).edit(&message_id, &text).await?),
    TicketAction::DeleteMessage { id, message_id } => {
      board.thread(&id).delete(&message_id).await?;
      println!("Deleted {}", message_id);
    }
  }
  Ok(())
}

/// Object URLs only need to live until the message is stored.
async fn send_with_attachments(
  thread: &ThreadHandle,
  text: &str,
  paths: &[PathBuf],
  reply_to: Option<ReplyTo>,
) -> Result<Message> {
  let registry = AttachmentRegistry::new();
  let attachments = paths
    .iter()
    .map(|p| registry.register(p))
    .collect::<jobdesk::Result<Vec<_>>>()?;
  let urls: Vec<String> = attachments.iter().map(|a| a.url.clone()).collect();

  let result = thread.reply(text, attachments, reply_to).await;
  for url in &urls {
    registry.release(url);
  }
  Ok(result?)
}

async fn print_thread(thread: &ThreadHandle) -> Result<()> {
  let messages = thread.load().await?;
  if messages.is_empty() {
    println!("No messages in {}", thread.key());
  }
  for message in messages.iter() {
    print_message(message);
  }
  Ok(())
}

fn print_message(message: &Message) {
  let edited = if message.edited { " (edited)" } else { "" };
  println!(
    "[{}] {} {}{}: {}",
    message.id,
    message.timestamp.format("%Y-%m-%d %H:%M"),
    message.sender,
    edited,
    message.content
  );
  if let Some(reply) = &message.reply_to {
    println!("    ↪ {} ({}): {}", reply.sender, reply.id, reply.content);
  }
  for attachment in &message.attachments {
    println!("    📎 {} <{}>", attachment.name, attachment.url);
  }
}

fn print_ticket<C: Category>(ticket: &Ticket<C>) {
  println!(
    "[{}] {} {:<8} {:<22} {}",
    ticket.id,
    ticket.created_at.format("%Y-%m-%d %H:%M"),
    ticket.status.to_string(),
    ticket.category.label(),
    ticket.title
  );
}

fn load_job(path: &Path) -> Result<Job> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read job file {}: {}", path.display(), e))?;
  serde_yaml::from_str(&contents)
    .map_err(|e| eyre!("Failed to parse job file {}: {}", path.display(), e))
}
