//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary project records, keyed by `project_id`.
    pub const PROJECTS: &str = "projects";

    /// Index: projects by team, keyed by `team_slug || 0x00 || project_id`.
    pub const PROJECTS_BY_TEAM: &str = "projects_by_team";

    /// Primary chat records, keyed by `chat_id`.
    pub const CHATS: &str = "chats";

    /// Index: chats by project, keyed by `project_id || chat_id`.
    pub const CHATS_BY_PROJECT: &str = "chats_by_project";

    /// Primary message records, keyed by `message_id`.
    pub const MESSAGES: &str = "messages";

    /// Index: messages by chat in time order, keyed by
    /// `chat_id || timestamp (8 bytes, order-preserving) || message_id`.
    pub const MESSAGES_BY_CHAT: &str = "messages_by_chat";

    /// Whiteboard layouts, keyed by `project_id`.
    pub const BLUEPRINTS: &str = "blueprints";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::PROJECTS,
        cf::PROJECTS_BY_TEAM,
        cf::CHATS,
        cf::CHATS_BY_PROJECT,
        cf::MESSAGES,
        cf::MESSAGES_BY_CHAT,
        cf::BLUEPRINTS,
    ]
}
