//! Typing indicators over the real-time socket.
//!
//! Frames are JSON objects `{"event": "<name>", "data": {...}}`:
//!
//! | event        | direction | data                                     |
//! |--------------|-----------|------------------------------------------|
//! | `join-chat`  | out       | `{chatId, userId}`                       |
//! | `typing`     | both      | `{chatId?, isAITyping}`                  |
//! | `user-typing`| both      | `{chatId?, isUserTyping, userId}`        |

use std::time::{Duration, Instant};

use async_trait::async_trait;
use blueprint_core::{ChatId, UserId};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::TypingError;

/// Default quiet period before a user is reported as no longer typing.
pub const DEFAULT_TYPING_DEBOUNCE: Duration = Duration::from_millis(500);

/// A frame on the typing socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum TypingFrame {
    /// Subscribe to a chat's typing events.
    #[serde(rename_all = "camelCase")]
    JoinChat {
        /// Chat to join.
        chat_id: ChatId,
        /// Joining user.
        user_id: UserId,
    },
    /// The assistant started or stopped composing.
    Typing {
        /// Chat the event is about; omitted by the server.
        #[serde(rename = "chatId", default, skip_serializing_if = "Option::is_none")]
        chat_id: Option<ChatId>,
        /// Whether the assistant is composing.
        #[serde(rename = "isAITyping")]
        is_ai_typing: bool,
    },
    /// A user started or stopped typing.
    #[serde(rename_all = "camelCase")]
    UserTyping {
        /// Chat the event is about; omitted by the server.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat_id: Option<ChatId>,
        /// Whether the user is typing.
        is_user_typing: bool,
        /// The typing user.
        user_id: UserId,
    },
}

/// An inbound typing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingEvent {
    /// The assistant started or stopped composing.
    Assistant {
        /// Whether the assistant is composing.
        typing: bool,
    },
    /// A user started or stopped typing.
    User {
        /// The typing user.
        user_id: UserId,
        /// Whether the user is typing.
        typing: bool,
    },
}

impl TypingEvent {
    /// Convert an inbound frame; `join-chat` carries no typing state.
    #[must_use]
    pub fn from_frame(frame: &TypingFrame) -> Option<Self> {
        match frame {
            TypingFrame::JoinChat { .. } => None,
            TypingFrame::Typing { is_ai_typing, .. } => Some(Self::Assistant {
                typing: *is_ai_typing,
            }),
            TypingFrame::UserTyping {
                is_user_typing,
                user_id,
                ..
            } => Some(Self::User {
                user_id: user_id.clone(),
                typing: *is_user_typing,
            }),
        }
    }
}

/// Who is typing in the current chat, as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypingPresence {
    /// The assistant is composing.
    pub ai_typing: bool,
    /// Another user is typing.
    pub other_user_typing: bool,
}

impl TypingPresence {
    /// Apply an inbound event. Echoes of our own typing are ignored.
    pub fn apply(&mut self, event: TypingEvent, own_user: &UserId) {
        match event {
            TypingEvent::Assistant { typing } => {
                self.ai_typing = typing;
                self.other_user_typing = false;
            }
            TypingEvent::User { user_id, typing } => {
                if user_id != *own_user {
                    self.other_user_typing = typing;
                }
            }
        }
    }
}

/// Debounces keystrokes into typing on/off transitions.
///
/// The first keystroke reports typing; typing ends once no keystroke has
/// arrived for the whole window.
#[derive(Debug, Clone)]
pub struct TypingDebounce {
    window: Duration,
    last_keystroke: Option<Instant>,
}

impl Default for TypingDebounce {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_DEBOUNCE)
    }
}

impl TypingDebounce {
    /// Create a debouncer with the given quiet window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_keystroke: None,
        }
    }

    /// Record a keystroke. Returns `Some(true)` when typing starts.
    pub fn keystroke(&mut self, now: Instant) -> Option<bool> {
        let started = self.last_keystroke.is_none();
        self.last_keystroke = Some(now);
        started.then_some(true)
    }

    /// Check the window. Returns `Some(false)` when typing has just ended.
    pub fn expire(&mut self, now: Instant) -> Option<bool> {
        let last = self.last_keystroke?;
        if now.saturating_duration_since(last) >= self.window {
            self.last_keystroke = None;
            Some(false)
        } else {
            None
        }
    }

    /// When typing will end if no further keystroke arrives.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.last_keystroke.map(|last| last + self.window)
    }

    /// Whether the user is currently reported as typing.
    #[must_use]
    pub const fn is_typing(&self) -> bool {
        self.last_keystroke.is_some()
    }

    /// Forget the pending keystroke without reporting a transition.
    pub fn reset(&mut self) {
        self.last_keystroke = None;
    }
}

/// Trait for emitting typing signals.
#[async_trait]
pub trait TypingSignal: Send + Sync {
    /// Subscribe to a chat's typing events.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be sent.
    async fn join_chat(&self, chat_id: &ChatId, user_id: &UserId) -> Result<(), TypingError>;

    /// Report whether the assistant is composing a reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be sent.
    async fn set_ai_typing(&self, chat_id: &ChatId, typing: bool) -> Result<(), TypingError>;

    /// Report whether a user is typing.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be sent.
    async fn set_user_typing(
        &self,
        chat_id: &ChatId,
        user_id: &UserId,
        typing: bool,
    ) -> Result<(), TypingError>;
}

/// Typing channel backed by a WebSocket connection.
#[derive(Debug, Clone)]
pub struct SocketTypingChannel {
    tx: mpsc::Sender<String>,
}

impl SocketTypingChannel {
    /// Connect and join a chat.
    ///
    /// Returns the channel and a receiver of inbound typing events. The
    /// receiver closes when the connection drops.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(
        url: &str,
        chat_id: &ChatId,
        user_id: &UserId,
    ) -> Result<(Self, mpsc::Receiver<TypingEvent>), TypingError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| TypingError::Connection(e.to_string()))?;

        let (write, read) = ws_stream.split();

        // Channel for outgoing frames
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<String>(32);

        // Channel for incoming events
        let (event_tx, event_rx) = mpsc::channel::<TypingEvent>(32);

        tokio::spawn(socket_writer(write, outgoing_rx));
        tokio::spawn(socket_reader(read, event_tx));

        let channel = Self { tx: outgoing_tx };
        channel.join_chat(chat_id, user_id).await?;

        tracing::debug!(chat_id = %chat_id, url = %url, "Typing channel connected");
        Ok((channel, event_rx))
    }

    async fn emit(&self, frame: &TypingFrame) -> Result<(), TypingError> {
        let json = serde_json::to_string(frame)?;
        self.tx
            .send(json)
            .await
            .map_err(|e| TypingError::Send(e.to_string()))
    }
}

#[async_trait]
impl TypingSignal for SocketTypingChannel {
    async fn join_chat(&self, chat_id: &ChatId, user_id: &UserId) -> Result<(), TypingError> {
        self.emit(&TypingFrame::JoinChat {
            chat_id: chat_id.clone(),
            user_id: user_id.clone(),
        })
        .await
    }

    async fn set_ai_typing(&self, chat_id: &ChatId, typing: bool) -> Result<(), TypingError> {
        self.emit(&TypingFrame::Typing {
            chat_id: Some(chat_id.clone()),
            is_ai_typing: typing,
        })
        .await
    }

    async fn set_user_typing(
        &self,
        chat_id: &ChatId,
        user_id: &UserId,
        typing: bool,
    ) -> Result<(), TypingError> {
        self.emit(&TypingFrame::UserTyping {
            chat_id: Some(chat_id.clone()),
            is_user_typing: typing,
            user_id: user_id.clone(),
        })
        .await
    }
}

type SocketStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Task that writes outgoing frames.
async fn socket_writer(
    mut write: futures::stream::SplitSink<SocketStream, Message>,
    mut rx: mpsc::Receiver<String>,
) {
    while let Some(text) = rx.recv().await {
        if write.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

/// Task that reads incoming frames and forwards typing events.
async fn socket_reader(
    mut read: futures::stream::SplitStream<SocketStream>,
    tx: mpsc::Sender<TypingEvent>,
) {
    while let Some(result) = read.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<TypingFrame>(&text) {
                Ok(frame) => {
                    if let Some(event) = TypingEvent::from_frame(&frame) {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring unrecognized socket frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Typing socket read failed");
                break;
            }
        }
    }
    tracing::debug!("Typing channel closed");
}

/// A typing signal that goes nowhere, for when no socket is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopTypingChannel;

impl NoopTypingChannel {
    /// Create a new no-op typing channel.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TypingSignal for NoopTypingChannel {
    async fn join_chat(&self, chat_id: &ChatId, _user_id: &UserId) -> Result<(), TypingError> {
        tracing::trace!(chat_id = %chat_id, "NoopTypingChannel: join_chat");
        Ok(())
    }

    async fn set_ai_typing(&self, chat_id: &ChatId, typing: bool) -> Result<(), TypingError> {
        tracing::trace!(chat_id = %chat_id, typing, "NoopTypingChannel: set_ai_typing");
        Ok(())
    }

    async fn set_user_typing(
        &self,
        chat_id: &ChatId,
        _user_id: &UserId,
        typing: bool,
    ) -> Result<(), TypingError> {
        tracing::trace!(chat_id = %chat_id, typing, "NoopTypingChannel: set_user_typing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn frames_match_wire_format() {
        let chat_id = ChatId::new("jd7a2k9q8w").unwrap();
        let user_id = UserId::new("k3f9a1").unwrap();

        let join = serde_json::to_value(TypingFrame::JoinChat {
            chat_id: chat_id.clone(),
            user_id: user_id.clone(),
        })
        .unwrap();
        assert_eq!(
            join,
            serde_json::json!({
                "event": "join-chat",
                "data": { "chatId": "jd7a2k9q8w", "userId": "k3f9a1" }
            })
        );

        let typing = serde_json::to_value(TypingFrame::Typing {
            chat_id: Some(chat_id.clone()),
            is_ai_typing: true,
        })
        .unwrap();
        assert_eq!(typing["event"], "typing");
        assert_eq!(typing["data"]["isAITyping"], true);

        let user = serde_json::to_value(TypingFrame::UserTyping {
            chat_id: Some(chat_id),
            is_user_typing: false,
            user_id,
        })
        .unwrap();
        assert_eq!(user["event"], "user-typing");
        assert_eq!(user["data"]["isUserTyping"], false);
    }

    #[test]
    fn inbound_user_typing_carries_opaque_user_id() {
        let frame: TypingFrame = serde_json::from_str(
            r#"{"event":"user-typing","data":{"isUserTyping":true,"userId":"k3f9a1"}}"#,
        )
        .unwrap();
        let other = UserId::new("k3f9a1").unwrap();
        assert_eq!(
            TypingEvent::from_frame(&frame),
            Some(TypingEvent::User {
                user_id: other.clone(),
                typing: true
            })
        );

        let mut presence = TypingPresence::default();
        if let Some(event) = TypingEvent::from_frame(&frame) {
            presence.apply(event, &UserId::new("n2b8").unwrap());
        }
        assert!(presence.other_user_typing);

        let empty: Result<TypingFrame, _> = serde_json::from_str(
            r#"{"event":"user-typing","data":{"isUserTyping":true,"userId":""}}"#,
        );
        assert!(empty.is_err());
    }

    #[test]
    fn inbound_frames_without_chat_id_parse() {
        let frame: TypingFrame =
            serde_json::from_str(r#"{"event":"typing","data":{"isAITyping":true}}"#).unwrap();
        assert_eq!(
            TypingEvent::from_frame(&frame),
            Some(TypingEvent::Assistant { typing: true })
        );
    }

    #[test]
    fn presence_ignores_own_echo() {
        let me = UserId::generate();
        let other = UserId::generate();
        let mut presence = TypingPresence::default();

        presence.apply(
            TypingEvent::User {
                user_id: me.clone(),
                typing: true,
            },
            &me,
        );
        assert!(!presence.other_user_typing);

        presence.apply(
            TypingEvent::User {
                user_id: other,
                typing: true,
            },
            &me,
        );
        assert!(presence.other_user_typing);

        presence.apply(TypingEvent::Assistant { typing: true }, &me);
        assert!(presence.ai_typing);
        assert!(!presence.other_user_typing);
    }

    #[test]
    fn debounce_emits_start_then_stop() {
        let start = Instant::now();
        let mut debounce = TypingDebounce::new(Duration::from_millis(500));

        assert_eq!(debounce.keystroke(start), Some(true));
        assert_eq!(debounce.keystroke(start + Duration::from_millis(100)), None);
        assert_eq!(debounce.expire(start + Duration::from_millis(400)), None);
        assert_eq!(
            debounce.deadline(),
            Some(start + Duration::from_millis(600))
        );

        assert_eq!(debounce.expire(start + Duration::from_millis(600)), Some(false));
        assert!(!debounce.is_typing());
        assert_eq!(debounce.expire(start + Duration::from_millis(900)), None);

        assert_eq!(debounce.keystroke(start + Duration::from_secs(2)), Some(true));
    }

    #[tokio::test]
    async fn socket_joins_then_relays_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let chat_id = ChatId::generate();
        let user_id = UserId::generate();
        let other = UserId::new("k3f9a1").unwrap();
        let sent_by = other.clone();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

            let mut received = Vec::new();
            for _ in 0..2 {
                if let Some(Ok(Message::Text(text))) = ws.next().await {
                    received.push(serde_json::from_str::<TypingFrame>(&text).unwrap());
                }
            }

            let frame = TypingFrame::UserTyping {
                chat_id: None,
                is_user_typing: true,
                user_id: sent_by,
            };
            ws.send(Message::Text(serde_json::to_string(&frame).unwrap()))
                .await
                .unwrap();
            received
        });

        let (channel, mut events) =
            SocketTypingChannel::connect(&format!("ws://{addr}"), &chat_id, &user_id)
                .await
                .unwrap();
        channel.set_ai_typing(&chat_id, true).await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            TypingEvent::User {
                user_id: other,
                typing: true
            }
        );

        let received = server.await.unwrap();
        assert_eq!(
            received[0],
            TypingFrame::JoinChat {
                chat_id: chat_id.clone(),
                user_id
            }
        );
        assert_eq!(
            received[1],
            TypingFrame::Typing {
                chat_id: Some(chat_id),
                is_ai_typing: true
            }
        );
    }
}
