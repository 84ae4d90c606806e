//! Merges message history from the store into one ordered, duplicate-free list.
//!
//! A chat view is fed from two queries with different cadences: one bulk load
//! of the full history (oldest first) and repeated polls of the newest few
//! messages (newest first). Messages are identified by their persisted ID.

use std::collections::HashSet;

use blueprint_core::MessageId;
use blueprint_store::Message;

/// Lifecycle of a reconciled chat view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    /// Waiting for the bulk load.
    Uninitialized,
    /// History loaded; only polls are applied from now on.
    Loaded,
}

/// Reconciled message list for one chat.
#[derive(Debug, Clone)]
pub struct MessageReconciler {
    state: ReconcilerState,
    messages: Vec<Message>,
    seen: HashSet<MessageId>,
}

impl Default for MessageReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageReconciler {
    /// Create an uninitialized reconciler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ReconcilerState::Uninitialized,
            messages: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ReconcilerState {
        self.state
    }

    /// Whether the bulk load is still outstanding.
    #[must_use]
    pub fn needs_bulk_load(&self) -> bool {
        self.state == ReconcilerState::Uninitialized
    }

    /// Apply the full history, oldest first.
    ///
    /// Only the first bulk load is applied; later ones are ignored and `false` is
    /// returned.
    pub fn apply_bulk_load(&mut self, messages: Vec<Message>) -> bool {
        if !self.needs_bulk_load() {
            return false;
        }

        self.messages.clear();
        self.seen.clear();
        for message in messages {
            if self.seen.insert(message.message_id) {
                self.messages.push(message);
            }
        }
        self.state = ReconcilerState::Loaded;
        true
    }

    /// Apply a poll of the newest messages, newest first.
    ///
    /// The batch is put back into chronological order and every message not yet
    /// present is appended. Returns the IDs that were added, oldest first.
    /// Polls arriving before the bulk load are ignored.
    pub fn apply_poll(&mut self, newest_first: Vec<Message>) -> Vec<MessageId> {
        if self.needs_bulk_load() {
            return Vec::new();
        }

        let mut added = Vec::new();
        for message in newest_first.into_iter().rev() {
            if self.seen.insert(message.message_id) {
                added.push(message.message_id);
                self.messages.push(message);
            }
        }
        added
    }

    /// Forget everything and wait for a new bulk load.
    pub fn reset(&mut self) {
        self.state = ReconcilerState::Uninitialized;
        self.messages.clear();
        self.seen.clear();
    }

    /// The reconciled messages in chronological order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of reconciled messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no messages have been reconciled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether a message is already in the list.
    #[must_use]
    pub fn contains(&self, message_id: &MessageId) -> bool {
        self.seen.contains(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_core::{ChatId, ProjectId};
    use blueprint_store::Role;
    use chrono::{TimeZone, Utc};

    fn message(n: u8) -> Message {
        Message {
            message_id: MessageId::from_bytes([n; 16]),
            chat_id: ChatId::new("jd7a2k9q8w").unwrap(),
            project_id: ProjectId::from_bytes([0xBB; 16]),
            role: Role::User,
            content: format!("m{n}"),
            author: None,
            timestamp: Utc.timestamp_opt(1_700_000_000 + i64::from(n), 0).unwrap(),
        }
    }

    fn contents(reconciler: &MessageReconciler) -> Vec<&str> {
        reconciler
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect()
    }

    #[test]
    fn bulk_load_then_poll_merges_in_order() {
        let mut reconciler = MessageReconciler::new();
        assert!(reconciler.apply_bulk_load(vec![message(1), message(2)]));

        let added = reconciler.apply_poll(vec![message(3), message(2)]);

        assert_eq!(contents(&reconciler), ["m1", "m2", "m3"]);
        assert_eq!(added, [message(3).message_id]);
    }

    #[test]
    fn repeated_poll_is_a_no_op() {
        let mut reconciler = MessageReconciler::new();
        reconciler.apply_bulk_load(vec![message(1)]);
        reconciler.apply_poll(vec![message(3), message(2)]);

        let added = reconciler.apply_poll(vec![message(3), message(2)]);

        assert!(added.is_empty());
        assert_eq!(contents(&reconciler), ["m1", "m2", "m3"]);
    }

    #[test]
    fn poll_before_bulk_load_is_ignored() {
        let mut reconciler = MessageReconciler::new();
        assert!(reconciler.apply_poll(vec![message(1)]).is_empty());
        assert!(reconciler.is_empty());
        assert!(reconciler.needs_bulk_load());
    }

    #[test]
    fn second_bulk_load_is_skipped() {
        let mut reconciler = MessageReconciler::new();
        reconciler.apply_bulk_load(vec![message(1)]);
        assert!(!reconciler.apply_bulk_load(vec![message(5), message(6)]));
        assert_eq!(contents(&reconciler), ["m1"]);
        assert_eq!(reconciler.state(), ReconcilerState::Loaded);
    }

    #[test]
    fn reset_forces_a_fresh_bulk_load() {
        let mut reconciler = MessageReconciler::new();
        reconciler.apply_bulk_load(vec![message(1), message(2)]);

        reconciler.reset();
        assert!(reconciler.needs_bulk_load());
        assert_eq!(reconciler.len(), 0);
        assert!(!reconciler.contains(&message(1).message_id));

        reconciler.apply_bulk_load(vec![message(9)]);
        assert_eq!(contents(&reconciler), ["m9"]);
    }

    #[test]
    fn bulk_load_drops_duplicates() {
        let mut reconciler = MessageReconciler::new();
        reconciler.apply_bulk_load(vec![message(1), message(1), message(2)]);
        assert_eq!(contents(&reconciler), ["m1", "m2"]);
    }
}
