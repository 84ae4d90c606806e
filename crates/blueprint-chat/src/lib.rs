//! Streaming chat engine for blueprint.
//!
//! A [`ChatSession`] sends a user's message to the chat backend, decodes the
//! streamed reply, persists both sides of the exchange and keeps a reconciled
//! view of the chat's history. Typing indicators travel over a separate
//! socket ([`SocketTypingChannel`]).
//!
//! # Modules
//!
//! - [`decoder`]: splits a reply stream into text and trailing token metadata
//! - [`reconciler`]: merges bulk loads and polls into one ordered list
//! - [`client`]: HTTP client for the chat backend
//! - [`typing`]: typing-indicator frames, debouncing and the socket client
//! - [`session`]: the send protocol
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use blueprint_chat::{ChatConfig, ChatSession, HttpChatBackend, NoopTypingChannel};
//! use blueprint_core::{ChatId, ProjectId, UserId};
//! use blueprint_store::RocksStore;
//!
//! # async fn run() -> blueprint_chat::Result<()> {
//! let config = ChatConfig::default();
//! let store = Arc::new(RocksStore::open("/tmp/blueprint-db")?);
//! let session = ChatSession::new(
//!     store,
//!     Arc::new(HttpChatBackend::new(&config.backend_url)),
//!     Arc::new(NoopTypingChannel::new()),
//!     ProjectId::generate(),
//!     UserId::generate(),
//!     &config,
//! );
//!
//! session.switch_chat(ChatId::generate()).await?;
//! let report = session
//!     .send_message_with("Add a users table", |chunk| print!("{chunk}"))
//!     .await?;
//! println!("\n[{:?} tokens]", report.response.token_count);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod reconciler;
pub mod session;
pub mod typing;

pub use client::{ChatBackend, HttpChatBackend, TextStream};
pub use config::ChatConfig;
pub use decoder::{DecodedResponse, StreamDecoder, StreamMetadata, METADATA_SENTINEL};
pub use error::{BackendError, ChatError, DecodeError, Result, TypingError};
pub use reconciler::{MessageReconciler, ReconcilerState};
pub use session::{ChatSession, DisplayMessage, SendReport, StreamState};
pub use typing::{
    NoopTypingChannel, SocketTypingChannel, TypingDebounce, TypingEvent, TypingFrame,
    TypingPresence, TypingSignal, DEFAULT_TYPING_DEBOUNCE,
};
