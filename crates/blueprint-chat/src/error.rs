//! Error types for the chat engine.
//!
//! Each seam has its own error ([`DecodeError`] for the response stream,
//! [`BackendError`] for the HTTP backend, [`TypingError`] for the socket).
//! [`ChatError`] aggregates what a send can fail with.

use blueprint_store::StoreError;
use thiserror::Error;

/// A result type using `ChatError`.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors raised while decoding a response stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The text after the metadata sentinel is not valid metadata JSON.
    #[error("malformed stream metadata: {0}")]
    MalformedMetadata(String),
}

/// Errors raised by the chat backend client.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// Failed to parse a response body.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The response stream broke off mid-body.
    #[error("stream interrupted: {0}")]
    Stream(String),
}

/// Errors raised by the typing-indicator channel.
#[derive(Debug, Error)]
pub enum TypingError {
    /// Failed to connect.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Failed to send a frame (the connection is gone).
    #[error("send failed: {0}")]
    Send(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by [`crate::ChatSession`] operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No chat is selected on the session.
    #[error("no active chat")]
    NoActiveChat,

    /// A send is already streaming on this session.
    #[error("a message is already being sent")]
    SendInProgress,

    /// The response stream carried malformed metadata.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The chat backend failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ChatError {
    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Backend(BackendError::Http(_) | BackendError::Stream(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_errors() {
        assert!(ChatError::Store(StoreError::Database("io".into())).is_retriable());
        assert!(ChatError::Backend(BackendError::Stream("reset".into())).is_retriable());

        assert!(!ChatError::NoActiveChat.is_retriable());
        assert!(!ChatError::SendInProgress.is_retriable());
        assert!(!ChatError::Decode(DecodeError::MalformedMetadata("x".into())).is_retriable());
        assert!(!ChatError::Backend(BackendError::Api {
            status: 400,
            message: "bad".into()
        })
        .is_retriable());
    }
}
