//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use blueprint_board::Blueprint;
use blueprint_core::{ChatId, MessageId, ProjectId, TeamId};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::{Chat, Message, NewMessage, Project};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes read-modify-write sequences: message inserts (so per-chat
    /// timestamps stay strictly increasing) and chat record updates.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Read and decode a single record.
    fn get_value<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect the keys of an index that start with `prefix`, in key order.
    fn index_keys(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut found = Vec::new();
        for item in iter {
            let (key, _) = item?;

            // Stop if we're past the prefix
            if !key.starts_with(prefix) {
                break;
            }
            found.push(key);
        }
        Ok(found)
    }

    /// Walk a chat's message index from newest to oldest, returning at most `limit` IDs.
    fn newest_message_ids(&self, chat_id: &ChatId, limit: usize) -> Result<Vec<MessageId>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let cf = self.cf(cf::MESSAGES_BY_CHAT)?;
        let prefix = keys::chat_prefix(chat_id);
        let upper = keys::chat_upper_bound(chat_id);
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&upper, Direction::Reverse));

        let mut ids = Vec::with_capacity(limit);
        for item in iter {
            let (key, _) = item?;

            if !key.starts_with(&prefix) {
                break;
            }
            ids.push(keys::extract_message_id_from_chat_message_key(&key));
            if ids.len() == limit {
                break;
            }
        }
        Ok(ids)
    }

    fn load_messages(&self, ids: impl IntoIterator<Item = MessageId>) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        for message_id in ids {
            match self.get_value(cf::MESSAGES, &keys::message_key(&message_id))? {
                Some(message) => messages.push(message),
                None => warn!(message_id = %message_id, "Message index points at a missing record"),
            }
        }
        Ok(messages)
    }
}

/// Nanoseconds since the epoch, as used in message index keys.
/// Decode the chat ID of a project-chat index key.
fn indexed_chat_id(key: &[u8]) -> Result<ChatId> {
    keys::extract_chat_id_from_project_chat_key(key)
        .ok_or_else(|| StoreError::Serialization("malformed project-chat index key".to_string()))
}

fn timestamp_nanos(timestamp: &DateTime<Utc>) -> Result<i64> {
    timestamp
        .timestamp_nanos_opt()
        .ok_or_else(|| StoreError::Serialization(format!("timestamp out of range: {timestamp}")))
}

impl Store for RocksStore {
    // =========================================================================
    // Project Operations
    // =========================================================================

    fn create_project(&self, project: &Project) -> Result<()> {
        let cf_projects = self.cf(cf::PROJECTS)?;
        let cf_by_team = self.cf(cf::PROJECTS_BY_TEAM)?;

        let value = Self::serialize(project)?;

        // A project that moved teams must leave its old index entry behind
        let old_team = self
            .get_project(&project.project_id)?
            .map(|p| p.team_id)
            .filter(|team| *team != project.team_id);

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_projects, keys::project_key(&project.project_id), &value);
        if let Some(old) = old_team {
            batch.delete_cf(&cf_by_team, keys::team_project_key(&old, &project.project_id));
        }
        batch.put_cf(
            &cf_by_team,
            keys::team_project_key(&project.team_id, &project.project_id),
            [],
        );

        self.db.write(batch)?;

        debug!(project_id = %project.project_id, team_id = %project.team_id, "Stored project");
        Ok(())
    }

    fn get_project(&self, project_id: &ProjectId) -> Result<Option<Project>> {
        self.get_value(cf::PROJECTS, &keys::project_key(project_id))
    }

    fn list_projects_by_team(&self, team_id: &TeamId) -> Result<Vec<Project>> {
        let mut projects = Vec::new();
        for key in self.index_keys(cf::PROJECTS_BY_TEAM, &keys::team_prefix(team_id))? {
            let project_id = keys::extract_project_id_from_team_project_key(&key);
            if let Some(project) = self.get_project(&project_id)? {
                projects.push(project);
            }
        }
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }

    fn delete_project(&self, project_id: &ProjectId) -> Result<()> {
        let _guard = self.write_lock.lock();
        let cf_projects = self.cf(cf::PROJECTS)?;
        let cf_by_team = self.cf(cf::PROJECTS_BY_TEAM)?;
        let cf_chats = self.cf(cf::CHATS)?;
        let cf_by_project = self.cf(cf::CHATS_BY_PROJECT)?;
        let cf_messages = self.cf(cf::MESSAGES)?;
        let cf_by_chat = self.cf(cf::MESSAGES_BY_CHAT)?;
        let cf_blueprints = self.cf(cf::BLUEPRINTS)?;

        let project = self.get_project(project_id)?.ok_or(StoreError::NotFound)?;

        let mut batch = WriteBatch::default();
        let mut chats = 0usize;
        let mut messages = 0usize;

        for chat_key in self.index_keys(cf::CHATS_BY_PROJECT, &keys::project_prefix(project_id))? {
            let chat_id = indexed_chat_id(&chat_key)?;
            for message_key in self.index_keys(cf::MESSAGES_BY_CHAT, &keys::chat_prefix(&chat_id))? {
                let message_id = keys::extract_message_id_from_chat_message_key(&message_key);
                batch.delete_cf(&cf_messages, keys::message_key(&message_id));
                batch.delete_cf(&cf_by_chat, &message_key);
                messages += 1;
            }
            batch.delete_cf(&cf_chats, keys::chat_key(&chat_id));
            batch.delete_cf(&cf_by_project, &chat_key);
            chats += 1;
        }

        batch.delete_cf(&cf_projects, keys::project_key(project_id));
        batch.delete_cf(&cf_by_team, keys::team_project_key(&project.team_id, project_id));
        batch.delete_cf(&cf_blueprints, keys::blueprint_key(project_id));

        self.db.write(batch)?;

        debug!(project_id = %project_id, chats, messages, "Deleted project");
        Ok(())
    }

    // =========================================================================
    // Chat Operations
    // =========================================================================

    fn put_chat(&self, chat: &Chat) -> Result<()> {
        if self.get_project(&chat.project_id)?.is_none() {
            return Err(StoreError::NotFound);
        }

        let cf_chats = self.cf(cf::CHATS)?;
        let cf_by_project = self.cf(cf::CHATS_BY_PROJECT)?;
        let value = Self::serialize(chat)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_chats, keys::chat_key(&chat.chat_id), &value);
        batch.put_cf(
            &cf_by_project,
            keys::project_chat_key(&chat.project_id, &chat.chat_id),
            [],
        );

        self.db.write(batch)?;

        Ok(())
    }

    fn get_chat(&self, chat_id: &ChatId) -> Result<Option<Chat>> {
        self.get_value(cf::CHATS, &keys::chat_key(chat_id))
    }

    fn list_chats_by_project(&self, project_id: &ProjectId) -> Result<Vec<Chat>> {
        let mut chats = Vec::new();
        for key in self.index_keys(cf::CHATS_BY_PROJECT, &keys::project_prefix(project_id))? {
            let chat_id = indexed_chat_id(&key)?;
            if let Some(chat) = self.get_chat(&chat_id)? {
                chats.push(chat);
            }
        }
        chats.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(chats)
    }

    fn update_chat_title(&self, chat_id: &ChatId, title: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut chat = self.get_chat(chat_id)?.ok_or(StoreError::NotFound)?;
        chat.title = Some(title.to_string());
        self.put_chat(&chat)
    }

    fn update_token_count(&self, chat_id: &ChatId, tokens: u64) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut chat = self.get_chat(chat_id)?.ok_or(StoreError::NotFound)?;
        chat.total_tokens_used = Some(tokens);
        self.put_chat(&chat)
    }

    // =========================================================================
    // Message Operations
    // =========================================================================

    fn add_message(&self, message: NewMessage) -> Result<Message> {
        let _guard = self.write_lock.lock();

        let chat = self.get_chat(&message.chat_id)?.ok_or(StoreError::NotFound)?;

        let mut timestamp = Utc::now();
        let newest = self.newest_message_ids(&message.chat_id, 1)?;
        if let Some(previous) = self.load_messages(newest)?.pop() {
            if timestamp <= previous.timestamp {
                timestamp = previous.timestamp + TimeDelta::nanoseconds(1);
            }
        }

        let stored = Message {
            message_id: MessageId::generate(),
            chat_id: message.chat_id,
            project_id: chat.project_id,
            role: message.role,
            content: message.content,
            author: message.author,
            timestamp,
        };

        let cf_messages = self.cf(cf::MESSAGES)?;
        let cf_by_chat = self.cf(cf::MESSAGES_BY_CHAT)?;
        let value = Self::serialize(&stored)?;
        let index_key = keys::chat_message_key(
            &stored.chat_id,
            timestamp_nanos(&stored.timestamp)?,
            &stored.message_id,
        );

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_messages, keys::message_key(&stored.message_id), &value);
        batch.put_cf(&cf_by_chat, &index_key, []);

        self.db.write(batch)?;

        debug!(
            chat_id = %stored.chat_id,
            message_id = %stored.message_id,
            role = %stored.role,
            "Added message"
        );
        Ok(stored)
    }

    fn list_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>> {
        let index = self.index_keys(cf::MESSAGES_BY_CHAT, &keys::chat_prefix(chat_id))?;
        self.load_messages(
            index
                .iter()
                .map(|key| keys::extract_message_id_from_chat_message_key(key)),
        )
    }

    fn latest_messages(&self, chat_id: &ChatId, limit: usize) -> Result<Vec<Message>> {
        let ids = self.newest_message_ids(chat_id, limit)?;
        self.load_messages(ids)
    }

    // =========================================================================
    // Blueprint Operations
    // =========================================================================

    fn put_blueprint(&self, blueprint: &Blueprint) -> Result<()> {
        let project_id = blueprint.project_id();
        if self.get_project(project_id)?.is_none() {
            return Err(StoreError::NotFound);
        }

        let cf = self.cf(cf::BLUEPRINTS)?;
        let value = Self::serialize(blueprint)?;

        self.db.put_cf(&cf, keys::blueprint_key(project_id), value)?;

        Ok(())
    }

    fn get_blueprint(&self, project_id: &ProjectId) -> Result<Option<Blueprint>> {
        self.get_value(cf::BLUEPRINTS, &keys::blueprint_key(project_id))
    }
}
