//! Domain types stored in the database.
//!
//! These types represent the persisted state of projects, chats and messages.

use blueprint_core::{ChatId, MessageId, ProjectId, TeamId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project record: the aggregate that owns chats and a whiteboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier.
    pub project_id: ProjectId,
    /// Owning team.
    pub team_id: TeamId,
    /// User who created the project.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project record with a fresh ID.
    #[must_use]
    pub fn new(
        team_id: TeamId,
        user_id: UserId,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            project_id: ProjectId::generate(),
            team_id,
            user_id,
            name: name.into(),
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A chat thread record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Identifier minted by the chat backend.
    pub chat_id: ChatId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Owning team.
    pub team_id: TeamId,
    /// User who opened the chat.
    pub created_by: UserId,
    /// Title set by rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tokens reported by the last completed exchange.
    #[serde(default)]
    pub total_tokens_used: Option<u64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A human user.
    User,
    /// The chat backend's model.
    Assistant,
}

impl Role {
    /// Lowercase name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier, assigned by the store.
    pub message_id: MessageId,
    /// Chat the message belongs to.
    pub chat_id: ChatId,
    /// Project of the chat.
    pub project_id: ProjectId,
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Authoring user, for user messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<UserId>,
    /// Time the store accepted the message. Strictly increasing within a chat.
    pub timestamp: DateTime<Utc>,
}

/// A message to be added; the store fills in the ID, project and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Target chat.
    pub chat_id: ChatId,
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Authoring user, for user messages.
    pub author: Option<UserId>,
}

impl NewMessage {
    /// A message typed by a user.
    #[must_use]
    pub fn user(chat_id: ChatId, author: UserId, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            role: Role::User,
            content: content.into(),
            author: Some(author),
        }
    }

    /// A reply from the assistant.
    #[must_use]
    pub fn assistant(chat_id: ChatId, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            role: Role::Assistant,
            content: content.into(),
            author: None,
        }
    }
}
