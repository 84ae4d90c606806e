//! HTTP client for the chat backend.
//!
//! The backend mints chat IDs and streams replies as chunked plain text (see
//! [`crate::decoder`] for the body format).
//!
//! Endpoints:
//! - `POST /api/gemini/chat-create` with `{ "projectId"?: string }`, answering `{ "chatId": string }`
//! - `POST /api/gemini/chat-send` with `{ "message": string, "chatId": string }`, answering a text stream

use async_trait::async_trait;
use blueprint_core::{ChatId, ProjectId};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::decoder::Utf8Chunker;
use crate::error::BackendError;

/// A reply body as a stream of text chunks.
pub type TextStream = BoxStream<'static, Result<String, BackendError>>;

/// Trait for chat backend communication.
///
/// This trait abstracts the backend, allowing for scripted implementations in tests.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Ask the backend for a new chat, optionally tied to a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no valid chat ID.
    async fn create_chat(&self, project_id: Option<&ProjectId>) -> Result<ChatId, BackendError>;

    /// Send a user message and open the reply stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it. Errors
    /// while reading the body are yielded by the stream itself.
    async fn send(&self, message: &str, chat_id: &ChatId) -> Result<TextStream, BackendError>;
}

/// HTTP client for the chat backend.
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatBackend {
    /// Create a new backend client.
    ///
    /// No request timeout is set: replies stream for as long as the backend
    /// keeps writing.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the backend (e.g., "http://localhost:4040")
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a new backend client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL of the backend.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Turn a non-success response into an error.
    async fn handle_error(response: reqwest::Response) -> BackendError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .ok()
            .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
            .unwrap_or_else(|| format!("backend returned status {status}"));

        BackendError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Request body for `chat-create`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a ProjectId>,
}

/// Response body of `chat-create`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChatResponse {
    chat_id: ChatId,
}

/// Request body for `chat-send`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    message: &'a str,
    chat_id: &'a ChatId,
}

/// Error response from the backend.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn create_chat(&self, project_id: Option<&ProjectId>) -> Result<ChatId, BackendError> {
        let url = format!("{}/api/gemini/chat-create", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&CreateChatRequest { project_id })
            .send()
            .await?;

        if !response.status().is_success() {
            let error = Self::handle_error(response).await;
            tracing::error!(error = %error, "Failed to create chat");
            return Err(error);
        }

        let created: CreateChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        tracing::debug!(chat_id = %created.chat_id, "Created chat via backend");
        Ok(created.chat_id)
    }

    async fn send(&self, message: &str, chat_id: &ChatId) -> Result<TextStream, BackendError> {
        let url = format!("{}/api/gemini/chat-send", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&SendRequest { message, chat_id })
            .send()
            .await?;

        if !response.status().is_success() {
            let error = Self::handle_error(response).await;
            tracing::error!(chat_id = %chat_id, error = %error, "Backend rejected message");
            return Err(error);
        }

        tracing::debug!(chat_id = %chat_id, "Reply stream opened");
        Ok(text_stream(response))
    }
}

/// Decode a response body into text chunks, never splitting a UTF-8 character.
fn text_stream(response: reqwest::Response) -> TextStream {
    let bytes = response.bytes_stream().boxed();

    stream::unfold(
        (bytes, Utf8Chunker::new(), false),
        |(mut bytes, mut chunker, done)| async move {
            if done {
                return None;
            }
            loop {
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        let text = chunker.push(&chunk);
                        if !text.is_empty() {
                            return Some((Ok(text), (bytes, chunker, false)));
                        }
                    }
                    Some(Err(e)) => {
                        let error = BackendError::Stream(e.to_string());
                        return Some((Err(error), (bytes, chunker, true)));
                    }
                    None => {
                        let rest = chunker.finish();
                        if rest.is_empty() {
                            return None;
                        }
                        return Some((Ok(rest), (bytes, chunker, true)));
                    }
                }
            }
        },
    )
    .boxed()
}
