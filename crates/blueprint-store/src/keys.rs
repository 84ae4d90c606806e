//! Key encoding utilities for `RocksDB`.
//!
//! All index keys are designed to support efficient prefix scans. Message
//! index keys additionally sort by time so a chat's history can be read in
//! either direction without loading it all.

use blueprint_core::{ChatId, MessageId, ProjectId, TeamId};

/// Length of an encoded message timestamp.
pub const TIMESTAMP_LEN: usize = 8;

/// Separator after a variable-length team slug or chat ID. Neither can contain it.
const SEPARATOR: u8 = 0x00;

/// Length of the fixed tail of a chat-message key: timestamp and message ID.
const MESSAGE_SUFFIX_LEN: usize = TIMESTAMP_LEN + 16;

/// Encode a project key (just the project ID bytes).
#[must_use]
pub fn project_key(project_id: &ProjectId) -> Vec<u8> {
    project_id.as_bytes().to_vec()
}

/// Encode a team-project index key: `team || 0x00 || project_id`.
#[must_use]
pub fn team_project_key(team_id: &TeamId, project_id: &ProjectId) -> Vec<u8> {
    let mut key = team_prefix(team_id);
    key.extend_from_slice(project_id.as_bytes());
    key
}

/// Encode a team prefix for scanning all projects of a team.
#[must_use]
pub fn team_prefix(team_id: &TeamId) -> Vec<u8> {
    let slug = team_id.as_str().as_bytes();
    let mut key = Vec::with_capacity(slug.len() + 17);
    key.extend_from_slice(slug);
    key.push(SEPARATOR);
    key
}

/// Extract the project ID from a team-project key (its last 16 bytes).
///
/// # Panics
///
/// Panics if the key is shorter than 16 bytes.
#[must_use]
pub fn extract_project_id_from_team_project_key(key: &[u8]) -> ProjectId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[key.len() - 16..]);
    ProjectId::from_bytes(bytes)
}

/// Encode a chat key (just the chat ID bytes).
#[must_use]
pub fn chat_key(chat_id: &ChatId) -> Vec<u8> {
    chat_id.as_str().as_bytes().to_vec()
}

/// Encode a project-chat index key: `project_id || chat_id`.
#[must_use]
pub fn project_chat_key(project_id: &ProjectId, chat_id: &ChatId) -> Vec<u8> {
    let chat = chat_id.as_str().as_bytes();
    let mut key = Vec::with_capacity(16 + chat.len());
    key.extend_from_slice(project_id.as_bytes());
    key.extend_from_slice(chat);
    key
}

/// Encode a project prefix for scanning all chats of a project.
#[must_use]
pub fn project_prefix(project_id: &ProjectId) -> Vec<u8> {
    project_id.as_bytes().to_vec()
}

/// Extract the chat ID from a project-chat key (everything after the project ID).
///
/// Returns `None` if the tail is not a valid chat ID.
#[must_use]
pub fn extract_chat_id_from_project_chat_key(key: &[u8]) -> Option<ChatId> {
    let tail = key.get(16..)?;
    let chat = std::str::from_utf8(tail).ok()?;
    ChatId::new(chat).ok()
}

/// Encode a message key (just the message ID bytes).
#[must_use]
pub fn message_key(message_id: &MessageId) -> Vec<u8> {
    message_id.as_bytes().to_vec()
}

/// Encode nanoseconds since the epoch so that byte order matches numeric order,
/// including for instants before 1970.
#[must_use]
pub fn encode_timestamp(nanos: i64) -> [u8; TIMESTAMP_LEN] {
    (nanos ^ i64::MIN).to_be_bytes()
}

/// Encode a chat-message index key: `chat_id || 0x00 || timestamp || message_id`.
#[must_use]
pub fn chat_message_key(chat_id: &ChatId, nanos: i64, message_id: &MessageId) -> Vec<u8> {
    let mut key = chat_prefix(chat_id);
    key.extend_from_slice(&encode_timestamp(nanos));
    key.extend_from_slice(message_id.as_bytes());
    key
}

/// Encode a chat prefix for scanning all messages of a chat.
#[must_use]
pub fn chat_prefix(chat_id: &ChatId) -> Vec<u8> {
    let chat = chat_id.as_str().as_bytes();
    let mut key = Vec::with_capacity(chat.len() + 1 + MESSAGE_SUFFIX_LEN);
    key.extend_from_slice(chat);
    key.push(SEPARATOR);
    key
}

/// The greatest possible chat-message key for a chat, used to seek backwards
/// from the newest message.
#[must_use]
pub fn chat_upper_bound(chat_id: &ChatId) -> Vec<u8> {
    let mut key = chat_prefix(chat_id);
    key.extend_from_slice(&[0xFF; MESSAGE_SUFFIX_LEN]);
    key
}

/// Extract the message ID from a chat-message key (its last 16 bytes).
///
/// # Panics
///
/// Panics if the key is shorter than 16 bytes.
#[must_use]
pub fn extract_message_id_from_chat_message_key(key: &[u8]) -> MessageId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[key.len() - 16..]);
    MessageId::from_bytes(bytes)
}

/// Encode a blueprint key (just the project ID bytes).
#[must_use]
pub fn blueprint_key(project_id: &ProjectId) -> Vec<u8> {
    project_id.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_project_key_roundtrip() {
        let team = TeamId::new("platform").unwrap();
        let project_id = ProjectId::generate();

        let key = team_project_key(&team, &project_id);
        assert_eq!(key.len(), "platform".len() + 1 + 16);
        assert!(key.starts_with(&team_prefix(&team)));
        assert_eq!(extract_project_id_from_team_project_key(&key), project_id);
    }

    #[test]
    fn team_prefix_does_not_match_longer_slug() {
        let short = TeamId::new("ops").unwrap();
        let long = TeamId::new("ops2").unwrap();
        let key = team_project_key(&long, &ProjectId::generate());
        assert!(!key.starts_with(&team_prefix(&short)));
    }

    #[test]
    fn project_chat_key_roundtrip() {
        let project_id = ProjectId::generate();
        let chat_id = ChatId::generate();

        let key = project_chat_key(&project_id, &chat_id);
        assert_eq!(key.len(), 16 + chat_id.as_str().len());
        assert_eq!(extract_chat_id_from_project_chat_key(&key), Some(chat_id));
    }

    #[test]
    fn backend_chat_ids_of_any_length_round_trip() {
        let project_id = ProjectId::generate();
        for raw in ["j", "jd7a2k9q8w", "k57a-9f_x.long/opaque+id"] {
            let chat_id = ChatId::new(raw).unwrap();
            let key = project_chat_key(&project_id, &chat_id);
            assert_eq!(extract_chat_id_from_project_chat_key(&key), Some(chat_id));
        }
        assert_eq!(extract_chat_id_from_project_chat_key(&[0u8; 16]), None);
    }

    #[test]
    fn chat_prefix_does_not_match_longer_chat_id() {
        let short = ChatId::new("jd7").unwrap();
        let long = ChatId::new("jd7a").unwrap();
        let key = chat_message_key(&long, 0, &MessageId::generate());
        assert!(!key.starts_with(&chat_prefix(&short)));
        assert!(key > chat_upper_bound(&short));
    }

    #[test]
    fn chat_message_keys_sort_by_time() {
        let chat_id = ChatId::generate();
        let early = chat_message_key(&chat_id, -5, &MessageId::from_bytes([0xFF; 16]));
        let mid = chat_message_key(&chat_id, 0, &MessageId::from_bytes([0x00; 16]));
        let late = chat_message_key(&chat_id, 1_700_000_000_000_000_000, &MessageId::generate());

        assert!(early < mid);
        assert!(mid < late);
        assert!(late < chat_upper_bound(&chat_id));
    }

    #[test]
    fn chat_message_key_roundtrip() {
        let chat_id = ChatId::generate();
        let message_id = MessageId::generate();

        let key = chat_message_key(&chat_id, 42, &message_id);
        assert_eq!(key.len(), chat_id.as_str().len() + 1 + TIMESTAMP_LEN + 16);
        assert!(key.starts_with(&chat_prefix(&chat_id)));
        assert_eq!(extract_message_id_from_chat_message_key(&key), message_id);
    }
}
