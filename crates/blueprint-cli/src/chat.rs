//! `blueprint chat` commands.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use blueprint_chat::{
    ChatSession, DisplayMessage, HttpChatBackend, NoopTypingChannel, SocketTypingChannel,
    TypingEvent, TypingSignal,
};
use blueprint_core::{ChatId, ProjectId, UserId};
use blueprint_store::{Message, RocksStore, Store};
use clap::Subcommand;
use tokio::sync::mpsc;

use crate::Context;

#[derive(Subcommand, Debug)]
pub enum ChatCommand {
    /// Start a new chat in a project.
    Create {
        /// Owning project.
        project_id: ProjectId,

        /// Optional title.
        #[arg(long)]
        title: Option<String>,
    },

    /// List a project's chats, oldest first.
    List {
        /// Owning project.
        project_id: ProjectId,
    },

    /// Set a chat's title.
    Rename {
        /// Chat to rename.
        chat_id: ChatId,

        /// New title.
        title: String,
    },

    /// Print a chat's messages.
    History {
        /// Chat to print.
        chat_id: ChatId,

        /// Only print the newest N messages.
        #[arg(long)]
        latest: Option<usize>,
    },

    /// Send a message and stream the assistant's reply.
    Send {
        /// Chat to send to.
        chat_id: ChatId,

        /// Message text.
        message: String,
    },

    /// Follow a chat: print new messages and typing indicators until Ctrl-C.
    Watch {
        /// Chat to follow.
        chat_id: ChatId,

        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

pub async fn run(ctx: &Context, command: ChatCommand) -> anyhow::Result<()> {
    match command {
        ChatCommand::Create { project_id, title } => {
            ctx.project(&project_id)?;
            let typing = Arc::new(NoopTypingChannel::new());
            let session = open_session(ctx, project_id, ctx.user()?, typing);
            let chat = session.create_chat(title).await?;
            println!("{}", chat.chat_id);
        }
        ChatCommand::List { project_id } => {
            ctx.project(&project_id)?;
            let chats = ctx.store.list_chats_by_project(&project_id)?;
            if chats.is_empty() {
                println!("No chats yet");
            }
            for chat in chats {
                let tokens = chat
                    .total_tokens_used
                    .map_or_else(|| "-".to_string(), |t| t.to_string());
                println!(
                    "{}  {}  {:>6} tokens  {}",
                    chat.chat_id,
                    chat.created_at.format("%Y-%m-%d %H:%M"),
                    tokens,
                    chat.title.as_deref().unwrap_or("(untitled)")
                );
            }
        }
        ChatCommand::Rename { chat_id, title } => {
            ctx.chat(&chat_id)?;
            ctx.store.update_chat_title(&chat_id, &title)?;
        }
        ChatCommand::History { chat_id, latest } => {
            ctx.chat(&chat_id)?;
            let messages = match latest {
                Some(limit) => {
                    let mut newest = ctx.store.latest_messages(&chat_id, limit)?;
                    newest.reverse();
                    newest
                }
                None => ctx.store.list_messages(&chat_id)?,
            };
            for message in &messages {
                print_message(message);
            }
        }
        ChatCommand::Send { chat_id, message } => send(ctx, chat_id, &message).await?,
        ChatCommand::Watch {
            chat_id,
            interval_ms,
        } => watch(ctx, chat_id, Duration::from_millis(interval_ms)).await?,
    }
    Ok(())
}

fn open_session(
    ctx: &Context,
    project_id: ProjectId,
    user_id: UserId,
    typing: Arc<dyn TypingSignal>,
) -> ChatSession<RocksStore> {
    ChatSession::new(
        Arc::clone(&ctx.store),
        Arc::new(HttpChatBackend::new(&ctx.config.backend_url)),
        typing,
        project_id,
        user_id,
        &ctx.config,
    )
}

/// Connect the typing socket, falling back to no indicators if it is down.
async fn connect_typing(
    ctx: &Context,
    chat_id: &ChatId,
    user_id: &UserId,
) -> (Arc<dyn TypingSignal>, Option<mpsc::Receiver<TypingEvent>>) {
    match SocketTypingChannel::connect(&ctx.config.socket_url, chat_id, user_id).await {
        Ok((channel, events)) => (Arc::new(channel), Some(events)),
        Err(e) => {
            tracing::warn!(url = %ctx.config.socket_url, error = %e, "Typing indicators unavailable");
            (Arc::new(NoopTypingChannel::new()), None)
        }
    }
}

async fn send(ctx: &Context, chat_id: ChatId, message: &str) -> anyhow::Result<()> {
    let chat = ctx.chat(&chat_id)?;
    let user_id = ctx.user()?;
    let (typing, _events) = connect_typing(ctx, &chat_id, &user_id).await;

    let session = open_session(ctx, chat.project_id, user_id, typing);
    session.switch_chat(chat_id).await?;

    let result = session
        .send_message_with(message, |chunk| {
            print!("{chunk}");
            io::stdout().flush().ok();
        })
        .await;
    println!();

    let report = result?;
    if let Some(tokens) = report.response.token_count {
        eprintln!("[{tokens} tokens]");
    }
    Ok(())
}

async fn watch(ctx: &Context, chat_id: ChatId, interval: Duration) -> anyhow::Result<()> {
    let chat = ctx.chat(&chat_id)?;
    let user_id = ctx.user()?;
    let (typing, mut events) = connect_typing(ctx, &chat_id, &user_id).await;

    let session = open_session(ctx, chat.project_id, user_id, typing);
    session.switch_chat(chat_id.clone()).await?;

    let mut printed = 0;
    let mut ticker = tokio::time::interval(interval);
    let mut presence = session.presence();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = session.refresh() {
                    tracing::warn!(chat_id = %chat_id, error = %e, "Poll failed");
                    continue;
                }
                let messages = session.messages();
                for entry in messages.iter().skip(printed) {
                    if let DisplayMessage::Persisted(message) = entry {
                        print_message(message);
                        printed += 1;
                    }
                }
            }

            event = next_event(&mut events) => {
                match event {
                    Some(event) => {
                        session.apply_typing_event(event);
                        let current = session.presence();
                        if current != presence {
                            presence = current;
                            print_presence(presence.ai_typing, presence.other_user_typing);
                        }
                    }
                    None => {
                        tracing::warn!(chat_id = %chat_id, "Typing channel closed");
                        events = None;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

/// Next typing event, or never if there is no channel.
async fn next_event(events: &mut Option<mpsc::Receiver<TypingEvent>>) -> Option<TypingEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_message(message: &Message) {
    println!(
        "[{}] {}: {}",
        message.timestamp.format("%H:%M:%S"),
        message.role,
        message.content
    );
}

fn print_presence(ai_typing: bool, other_user_typing: bool) {
    match (ai_typing, other_user_typing) {
        (true, _) => eprintln!("-- assistant is typing"),
        (false, true) => eprintln!("-- someone is typing"),
        (false, false) => eprintln!("-- nobody is typing"),
    }
}
