//! Core types and utilities for blueprint.
//!
//! This crate provides the foundational types used throughout the blueprint workspace:
//!
//! - **Identifiers**: Strongly-typed IDs for projects, chats, messages, users, teams and
//!   whiteboard elements
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use blueprint_core::{ChatId, MessageId, TeamId};
//!
//! // Chat IDs arrive from the backend as opaque strings
//! let chat_id: ChatId = "jd7a2k9q8w".parse().unwrap();
//!
//! // Message IDs are minted locally
//! let message_id = MessageId::generate();
//!
//! // Teams are slugs
//! let team = TeamId::new("platform").unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;

pub use error::{CoreError, Result};
pub use ids::{
    CabinetId, ChatId, IdError, LayerId, MessageId, ProjectId, RowId, TableId, TeamId, UserId,
    MAX_OPAQUE_ID_LEN, MAX_TEAM_ID_LEN,
};
