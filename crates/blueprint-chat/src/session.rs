//! Chat session: the send protocol and the reconciled chat view.
//!
//! A [`ChatSession`] ties one user and project to the store, the chat backend
//! and the typing channel. Sending a message follows a fixed sequence:
//!
//! 1. persist the user message,
//! 2. open the reply stream, then report the assistant as composing,
//! 3. decode the stream chunk by chunk, exposing the partial reply,
//! 4. persist the reply,
//! 5. record the reported token count on the chat,
//! 6. clear the partial reply on success; always stop the composing signal.
//!
//! Failures are logged and returned. Nothing is retried or rolled back, so a
//! failed send may leave a user message without a reply.
//!
//! Session state sits behind a synchronous mutex that is never held across an
//! `.await`, so polls and typing events can be applied while a reply streams.

use std::sync::Arc;
use std::time::Instant;

use blueprint_core::{ChatId, MessageId, ProjectId, UserId};
use blueprint_store::{Chat, Message, NewMessage, Store, StoreError};
use chrono::Utc;
use futures::StreamExt;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::client::ChatBackend;
use crate::config::ChatConfig;
use crate::decoder::{DecodedResponse, StreamDecoder};
use crate::error::{ChatError, Result};
use crate::reconciler::MessageReconciler;
use crate::typing::{TypingDebounce, TypingEvent, TypingPresence, TypingSignal};

/// The in-flight assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    /// Reply text received so far.
    pub accumulated_text: String,
    /// Token count, once the stream's metadata has arrived.
    pub token_count: Option<u64>,
    /// Whether the reply is still streaming.
    pub is_streaming: bool,
}

/// An entry of the chat view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayMessage {
    /// A message known to the store.
    Persisted(Message),
    /// The assistant reply being streamed (or left over from a failed send).
    Streaming {
        /// Reply text received so far.
        content: String,
    },
}

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// The persisted user message.
    pub user_message: Message,
    /// The persisted assistant reply.
    pub assistant_message: Message,
    /// The decoded reply.
    pub response: DecodedResponse,
}

#[derive(Debug)]
struct SessionState {
    chat_id: Option<ChatId>,
    reconciler: MessageReconciler,
    stream: StreamState,
    /// Chat the transient reply belongs to.
    stream_chat: Option<ChatId>,
    /// Persisted ID of the transient reply, once step 4 has run.
    persisted_reply: Option<MessageId>,
    sending: bool,
    token_used: Option<u64>,
    presence: TypingPresence,
    debounce: TypingDebounce,
}

impl SessionState {
    fn clear_transient(&mut self) {
        self.stream.accumulated_text.clear();
        self.stream.token_count = None;
        self.stream_chat = None;
        self.persisted_reply = None;
    }

    /// Drop the transient reply once its persisted copy is in the list.
    fn drop_reconciled_transient(&mut self) {
        if self.stream.is_streaming {
            return;
        }
        if let Some(reply) = self.persisted_reply {
            if self.reconciler.contains(&reply) {
                self.clear_transient();
            }
        }
    }

    /// Put a message this session just wrote into the view.
    fn merge_persisted(&mut self, message: &Message) {
        if self.chat_id.as_ref() == Some(&message.chat_id) {
            self.reconciler.apply_poll(vec![message.clone()]);
        }
    }
}

/// Releases the send guard even if the send future is dropped.
struct SendGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.sending = false;
        state.stream.is_streaming = false;
    }
}

/// A user's chat session within one project.
pub struct ChatSession<S: Store> {
    store: Arc<S>,
    backend: Arc<dyn ChatBackend>,
    typing: Arc<dyn TypingSignal>,
    project_id: ProjectId,
    user_id: UserId,
    latest_window: usize,
    state: Mutex<SessionState>,
}

impl<S: Store> ChatSession<S> {
    /// Create a session with no chat selected.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        backend: Arc<dyn ChatBackend>,
        typing: Arc<dyn TypingSignal>,
        project_id: ProjectId,
        user_id: UserId,
        config: &ChatConfig,
    ) -> Self {
        Self {
            store,
            backend,
            typing,
            project_id,
            user_id,
            latest_window: config.latest_window,
            state: Mutex::new(SessionState {
                chat_id: None,
                reconciler: MessageReconciler::new(),
                stream: StreamState::default(),
                stream_chat: None,
                persisted_reply: None,
                sending: false,
                token_used: None,
                presence: TypingPresence::default(),
                debounce: TypingDebounce::new(config.typing_debounce()),
            }),
        }
    }

    /// The project this session belongs to.
    #[must_use]
    pub const fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// The session's user.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The selected chat.
    #[must_use]
    pub fn chat_id(&self) -> Option<ChatId> {
        self.state.lock().chat_id.clone()
    }

    // =========================================================================
    // Chat selection
    // =========================================================================

    /// Ask the backend for a new chat, record it and select it.
    ///
    /// # Errors
    ///
    /// Returns an error if the project is unknown, the backend fails, or the
    /// chat cannot be stored.
    pub async fn create_chat(&self, title: Option<String>) -> Result<Chat> {
        let project = self
            .store
            .get_project(&self.project_id)?
            .ok_or(StoreError::NotFound)?;

        let chat_id = self.backend.create_chat(Some(&self.project_id)).await?;
        let chat = Chat {
            chat_id,
            project_id: project.project_id,
            team_id: project.team_id,
            created_by: self.user_id.clone(),
            title,
            total_tokens_used: None,
            created_at: Utc::now(),
        };
        self.store.put_chat(&chat)?;
        debug!(chat_id = %chat.chat_id, project_id = %self.project_id, "Created chat");

        self.switch_chat(chat.chat_id.clone()).await?;
        Ok(chat)
    }

    /// Select a chat. Selecting a different chat clears the view and forces a
    /// fresh bulk load on the next refresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat's token count cannot be read.
    pub async fn switch_chat(&self, chat_id: ChatId) -> Result<()> {
        let token_used = self
            .store
            .get_chat(&chat_id)?
            .and_then(|chat| chat.total_tokens_used);

        {
            let mut state = self.state.lock();
            if state.chat_id.as_ref() == Some(&chat_id) {
                return Ok(());
            }
            state.chat_id = Some(chat_id.clone());
            state.reconciler.reset();
            state.token_used = token_used;
            state.presence = TypingPresence::default();
            state.debounce.reset();
            if !state.sending {
                state.stream = StreamState::default();
                state.clear_transient();
            }
        }

        debug!(chat_id = %chat_id, "Switched chat");
        if let Err(e) = self.typing.join_chat(&chat_id, &self.user_id).await {
            warn!(chat_id = %chat_id, error = %e, "Failed to join typing channel");
        }
        Ok(())
    }

    // =========================================================================
    // Reconciled view
    // =========================================================================

    /// Pull from the store: the full history on first use, the newest
    /// messages afterwards. Returns the IDs added to the view.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NoActiveChat` without a selected chat, or a store error.
    pub fn refresh(&self) -> Result<Vec<MessageId>> {
        let (chat_id, bulk) = {
            let state = self.state.lock();
            let chat_id = state.chat_id.clone().ok_or(ChatError::NoActiveChat)?;
            (chat_id, state.reconciler.needs_bulk_load())
        };

        let fetched = if bulk {
            self.store.list_messages(&chat_id)?
        } else {
            self.store.latest_messages(&chat_id, self.latest_window)?
        };
        let token_used = self
            .store
            .get_chat(&chat_id)?
            .and_then(|chat| chat.total_tokens_used);

        let mut state = self.state.lock();
        if state.chat_id.as_ref() != Some(&chat_id) {
            // Switched while reading; the result belongs to the old chat
            return Ok(Vec::new());
        }

        let added = if bulk {
            let ids: Vec<MessageId> = fetched.iter().map(|m| m.message_id).collect();
            if state.reconciler.apply_bulk_load(fetched) {
                ids
            } else {
                Vec::new()
            }
        } else {
            state.reconciler.apply_poll(fetched)
        };

        if token_used.is_some() {
            state.token_used = token_used;
        }
        state.drop_reconciled_transient();

        Ok(added)
    }

    /// The chat view: reconciled messages plus the transient reply, if any.
    #[must_use]
    pub fn messages(&self) -> Vec<DisplayMessage> {
        let state = self.state.lock();
        let mut view: Vec<DisplayMessage> = state
            .reconciler
            .messages()
            .iter()
            .cloned()
            .map(DisplayMessage::Persisted)
            .collect();

        let reply_reconciled = state
            .persisted_reply
            .is_some_and(|id| state.reconciler.contains(&id));
        let shows_transient = state.stream_chat.is_some()
            && state.stream_chat == state.chat_id
            && !reply_reconciled
            && (state.stream.is_streaming || !state.stream.accumulated_text.is_empty());

        if shows_transient {
            view.push(DisplayMessage::Streaming {
                content: state.stream.accumulated_text.clone(),
            });
        }
        view
    }

    /// A snapshot of the in-flight reply.
    #[must_use]
    pub fn stream_state(&self) -> StreamState {
        self.state.lock().stream.clone()
    }

    /// Whether a reply is streaming.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.state.lock().stream.is_streaming
    }

    /// Tokens used by the chat's last exchange.
    #[must_use]
    pub fn token_used(&self) -> Option<u64> {
        self.state.lock().token_used
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Send a message and wait for the full reply.
    ///
    /// # Errors
    ///
    /// See [`ChatSession::send_message_with`].
    pub async fn send_message(&self, text: &str) -> Result<SendReport> {
        self.send_message_with(text, |_| {}).await
    }

    /// Send a message, calling `on_chunk` with each piece of reply text as it
    /// arrives.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NoActiveChat` without a selected chat and
    /// `ChatError::SendInProgress` while another send is streaming. Otherwise
    /// returns the first store, backend or decode error; earlier steps are not
    /// undone.
    pub async fn send_message_with<F>(&self, text: &str, mut on_chunk: F) -> Result<SendReport>
    where
        F: FnMut(&str) + Send,
    {
        let chat_id = {
            let mut state = self.state.lock();
            let chat_id = state.chat_id.clone().ok_or(ChatError::NoActiveChat)?;
            if state.sending {
                return Err(ChatError::SendInProgress);
            }
            state.sending = true;
            state.stream = StreamState::default();
            state.clear_transient();
            state.stream_chat = Some(chat_id.clone());
            chat_id
        };
        let guard = SendGuard { state: &self.state };

        let mut user_message = None;
        let result = self
            .run_send(&chat_id, text, &mut on_chunk, &mut user_message)
            .await;

        {
            let mut state = self.state.lock();
            if result.is_ok() {
                state.clear_transient();
            }
            state.stream.is_streaming = false;
        }
        self.signal_ai_typing(&chat_id, false).await;
        drop(guard);

        match &result {
            Ok(report) => {
                debug!(
                    chat_id = %chat_id,
                    message_id = %report.assistant_message.message_id,
                    tokens = ?report.response.token_count,
                    "Reply persisted"
                );
            }
            Err(e) => {
                error!(chat_id = %chat_id, error = %e, "Failed to send message");
                if let Some(message) = &user_message {
                    warn!(
                        chat_id = %chat_id,
                        message_id = %message.message_id,
                        "User message persisted without a reply"
                    );
                }
            }
        }

        result
    }

    async fn run_send<F>(
        &self,
        chat_id: &ChatId,
        text: &str,
        on_chunk: &mut F,
        user_message: &mut Option<Message>,
    ) -> Result<SendReport>
    where
        F: FnMut(&str) + Send,
    {
        // 1. Persist the user's message
        let user = self
            .store
            .add_message(NewMessage::user(chat_id.clone(), self.user_id.clone(), text))?;
        self.state.lock().merge_persisted(&user);
        *user_message = Some(user.clone());

        // 2. Open the reply stream, then report the assistant as composing
        let mut chunks = self.backend.send(text, chat_id).await?;
        self.state.lock().stream.is_streaming = true;
        self.signal_ai_typing(chat_id, true).await;

        // 3. Decode chunk by chunk
        let mut decoder = StreamDecoder::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            match decoder.push(&chunk) {
                Ok(delta) => {
                    {
                        let mut state = self.state.lock();
                        state.stream.accumulated_text.push_str(delta);
                        if let Some(tokens) = decoder.token_count() {
                            state.stream.token_count = Some(tokens);
                            if state.chat_id.as_ref() == Some(chat_id) {
                                state.token_used = Some(tokens);
                            }
                        }
                    }
                    if !delta.is_empty() {
                        on_chunk(delta);
                    }
                }
                Err(e) => {
                    self.state.lock().stream.accumulated_text = decoder.text().to_string();
                    return Err(e.into());
                }
            }
        }
        let response = decoder.finish();

        // 4. Persist the reply
        let assistant = self
            .store
            .add_message(NewMessage::assistant(chat_id.clone(), response.text.clone()))?;
        {
            let mut state = self.state.lock();
            state.persisted_reply = Some(assistant.message_id);
            state.merge_persisted(&assistant);
        }

        // 5. Record the token count
        if let Some(tokens) = response.token_count {
            self.store.update_token_count(chat_id, tokens)?;
        }

        Ok(SendReport {
            user_message: user,
            assistant_message: assistant,
            response,
        })
    }

    async fn signal_ai_typing(&self, chat_id: &ChatId, typing: bool) {
        if let Err(e) = self.typing.set_ai_typing(chat_id, typing).await {
            warn!(chat_id = %chat_id, typing, error = %e, "Failed to signal assistant typing");
        }
    }

    // =========================================================================
    // Typing indicators
    // =========================================================================

    /// Record a keystroke, reporting the user as typing if they were not.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NoActiveChat` without a selected chat.
    pub async fn user_keystroke(&self) -> Result<()> {
        let (chat_id, transition) = {
            let mut state = self.state.lock();
            let chat_id = state.chat_id.clone().ok_or(ChatError::NoActiveChat)?;
            (chat_id, state.debounce.keystroke(Instant::now()))
        };
        if let Some(typing) = transition {
            self.signal_user_typing(&chat_id, typing).await;
        }
        Ok(())
    }

    /// Report the user as done typing once the debounce window has passed.
    /// Returns whether typing ended.
    pub async fn expire_user_typing(&self) -> bool {
        let expired = {
            let mut state = self.state.lock();
            let chat_id = state.chat_id.clone();
            chat_id.zip(state.debounce.expire(Instant::now()))
        };
        match expired {
            Some((chat_id, typing)) => {
                self.signal_user_typing(&chat_id, typing).await;
                true
            }
            None => false,
        }
    }

    /// When the user will be reported as done typing.
    #[must_use]
    pub fn typing_deadline(&self) -> Option<Instant> {
        self.state.lock().debounce.deadline()
    }

    async fn signal_user_typing(&self, chat_id: &ChatId, typing: bool) {
        if let Err(e) = self
            .typing
            .set_user_typing(chat_id, &self.user_id, typing)
            .await
        {
            warn!(chat_id = %chat_id, typing, error = %e, "Failed to signal user typing");
        }
    }

    /// Apply an inbound typing event.
    pub fn apply_typing_event(&self, event: TypingEvent) {
        self.state.lock().presence.apply(event, &self.user_id);
    }

    /// Who else is typing.
    #[must_use]
    pub fn presence(&self) -> TypingPresence {
        self.state.lock().presence
    }
}
