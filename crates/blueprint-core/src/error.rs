//! Common error types for blueprint.
//!
//! This module provides shared error types that are used across multiple crates.

use crate::ids::{ChatId, ProjectId};
use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout the blueprint system.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A project with the specified ID was not found.
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// A chat with the specified ID was not found.
    #[error("chat not found: {0}")]
    ChatNotFound(ChatId),

    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
