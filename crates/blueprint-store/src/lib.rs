//! `RocksDB` storage layer for blueprint.
//!
//! This crate is the database interface of the workspace: projects, their chats
//! and chat messages, and each project's whiteboard layout.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `projects`: Primary project records, keyed by `project_id`
//! - `projects_by_team`: Index for listing projects by team
//! - `chats`: Primary chat records, keyed by `chat_id`
//! - `chats_by_project`: Index for listing chats by project
//! - `messages`: Primary message records, keyed by `message_id`
//! - `messages_by_chat`: Time-ordered index of messages per chat
//! - `blueprints`: Whiteboard layouts, keyed by `project_id`
//!
//! # Example
//!
//! ```no_run
//! use blueprint_store::{RocksStore, Store};
//! use blueprint_core::ChatId;
//!
//! let store = RocksStore::open("/tmp/blueprint-db").unwrap();
//!
//! // Latest five messages of a chat, newest first
//! let chat_id: ChatId = "jd7a2k9q8w".parse().unwrap();
//! let latest = store.latest_messages(&chat_id, 5).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{Chat, Message, NewMessage, Project, Role};

use blueprint_board::Blueprint;
use blueprint_core::{ChatId, ProjectId, TeamId};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, or wrappers that inject failures in tests).
pub trait Store: Send + Sync {
    // =========================================================================
    // Project Operations
    // =========================================================================

    /// Insert or update a project record.
    ///
    /// This also maintains the team index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn create_project(&self, project: &Project) -> Result<()>;

    /// Get a project by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_project(&self, project_id: &ProjectId) -> Result<Option<Project>>;

    /// List all projects of a team.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_projects_by_team(&self, team_id: &TeamId) -> Result<Vec<Project>>;

    /// Delete a project together with its chats, their messages and its whiteboard.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the project doesn't exist.
    fn delete_project(&self, project_id: &ProjectId) -> Result<()>;

    // =========================================================================
    // Chat Operations
    // =========================================================================

    /// Insert or update a chat record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the chat's project doesn't exist.
    fn put_chat(&self, chat: &Chat) -> Result<()>;

    /// Get a chat by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_chat(&self, chat_id: &ChatId) -> Result<Option<Chat>>;

    /// List all chats of a project, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_chats_by_project(&self, project_id: &ProjectId) -> Result<Vec<Chat>>;

    /// Set a chat's title.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the chat doesn't exist.
    fn update_chat_title(&self, chat_id: &ChatId, title: &str) -> Result<()>;

    /// Replace a chat's token count with the value reported by the last exchange.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the chat doesn't exist.
    fn update_token_count(&self, chat_id: &ChatId, tokens: u64) -> Result<()>;

    // =========================================================================
    // Message Operations
    // =========================================================================

    /// Add a message, assigning its ID and timestamp.
    ///
    /// Timestamps are strictly increasing within a chat.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the chat doesn't exist.
    fn add_message(&self, message: NewMessage) -> Result<Message>;

    /// All messages of a chat, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>>;

    /// The newest `limit` messages of a chat, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn latest_messages(&self, chat_id: &ChatId, limit: usize) -> Result<Vec<Message>>;

    // =========================================================================
    // Blueprint Operations
    // =========================================================================

    /// Insert or replace a project's whiteboard.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the project doesn't exist.
    fn put_blueprint(&self, blueprint: &Blueprint) -> Result<()>;

    /// Get a project's whiteboard.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_blueprint(&self, project_id: &ProjectId) -> Result<Option<Blueprint>>;
}
