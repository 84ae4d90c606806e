//! Blueprint CLI - manage projects, chat with the assistant and edit whiteboards.
//!
//! This is the entry point for the `blueprint` binary.

mod board;
mod chat;
mod project;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use blueprint_chat::ChatConfig;
use blueprint_core::{ChatId, CoreError, ProjectId, TeamId, UserId};
use blueprint_store::{Chat, Project, RocksStore, Store};
use clap::{Parser, Subcommand};

use board::BoardCommand;
use chat::ChatCommand;
use project::ProjectCommand;

/// Blueprint CLI - projects, chats and architecture whiteboards.
#[derive(Parser, Debug)]
#[command(name = "blueprint")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the local database.
    #[arg(long, env = "BLUEPRINT_DATA_DIR", default_value = ".blueprint")]
    data_dir: PathBuf,

    /// Chat backend URL.
    #[arg(long, env = "BLUEPRINT_BACKEND", default_value = "http://localhost:4040")]
    backend: String,

    /// Typing-indicator socket URL.
    #[arg(long, env = "BLUEPRINT_SOCKET", default_value = "ws://localhost:4040/socket")]
    socket: String,

    /// Acting user.
    #[arg(long, env = "BLUEPRINT_USER")]
    user: Option<UserId>,

    /// Team whose projects are listed and created.
    #[arg(long, env = "BLUEPRINT_TEAM", default_value = "default")]
    team: TeamId,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create, list and remove projects.
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Create chats, read history and talk to the assistant.
    #[command(subcommand)]
    Chat(ChatCommand),

    /// Inspect and edit a project's whiteboard.
    #[command(subcommand)]
    Board(BoardCommand),
}

/// Everything a command needs.
struct Context {
    store: Arc<RocksStore>,
    config: ChatConfig,
    user: Option<UserId>,
    team: TeamId,
}

impl Context {
    /// The acting user, required by commands that write on their behalf.
    fn user(&self) -> anyhow::Result<UserId> {
        self.user
            .clone()
            .context("a user ID is required (--user or BLUEPRINT_USER)")
    }

    fn project(&self, project_id: &ProjectId) -> anyhow::Result<Project> {
        Ok(self
            .store
            .get_project(project_id)?
            .ok_or(CoreError::ProjectNotFound(*project_id))?)
    }

    fn chat(&self, chat_id: &ChatId) -> anyhow::Result<Chat> {
        Ok(self
            .store
            .get_chat(chat_id)?
            .ok_or_else(|| CoreError::ChatNotFound(chat_id.clone()))?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("blueprint=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    }

    let store = RocksStore::open(&args.data_dir)
        .with_context(|| format!("failed to open database at {}", args.data_dir.display()))?;

    let ctx = Context {
        store: Arc::new(store),
        config: ChatConfig {
            backend_url: args.backend,
            socket_url: args.socket,
            ..ChatConfig::default()
        },
        user: args.user,
        team: args.team,
    };

    match args.command {
        Command::Project(command) => project::run(&ctx, command),
        Command::Chat(command) => chat::run(&ctx, command).await,
        Command::Board(command) => board::run(&ctx, command),
    }
}
