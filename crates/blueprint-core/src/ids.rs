//! Core identifier types for blueprint.
//!
//! Every persisted aggregate (projects, chats, messages) and every whiteboard element
//! (layers, cabinets, tables, rows) gets its own strongly-typed identifier so they can
//! never be mixed up. IDs minted locally wrap a UUID v4. Chat and user IDs come from
//! peers that treat them as opaque strings, and team IDs are human-chosen slugs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Define a UUID-backed identifier with the common conversions.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Create the identifier from a UUID.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Create the identifier from its 16 raw bytes.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(bytes))
            }

            /// Generate a new random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Return the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// Return the bytes of the UUID.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
                Ok(Self(uuid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

uuid_id! {
    /// Identifier of a project (the aggregate that owns chats and a blueprint).
    ProjectId
}

uuid_id! {
    /// Identifier of a persisted chat message. Message identity is what the
    /// reconciler deduplicates on.
    MessageId
}

uuid_id! {
    /// Identifier of a layer on the architecture whiteboard.
    LayerId
}

uuid_id! {
    /// Identifier of a cabinet (a named sub-grouping within a layer).
    CabinetId
}

uuid_id! {
    /// Identifier of a database table diagram.
    TableId
}

uuid_id! {
    /// Identifier of a row (column definition) inside a table diagram.
    RowId
}

/// Maximum length of an opaque string identifier, in bytes.
pub const MAX_OPAQUE_ID_LEN: usize = 128;

/// Define an identifier that peers hand out as an arbitrary string.
///
/// Any non-empty string of at most [`MAX_OPAQUE_ID_LEN`] bytes without control
/// characters is accepted. Keeping NUL out lets the store use it as a key separator.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate an identifier.
            ///
            /// # Errors
            ///
            /// Returns an error if the input is empty, too long, or contains
            /// control characters.
            pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
                let id = id.into();
                if id.is_empty() || id.len() > MAX_OPAQUE_ID_LEN {
                    return Err(IdError::InvalidLength {
                        expected: MAX_OPAQUE_ID_LEN,
                        got: id.len(),
                    });
                }
                if id.chars().any(char::is_control) {
                    return Err(IdError::ControlCharacter(id));
                }
                Ok(Self(id))
            }

            /// Mint a new random identifier (a UUID v4 string).
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Return the identifier as a string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

opaque_id! {
    /// Identifier of a chat thread.
    ///
    /// Chat IDs are minted by the chat backend (`chat-create`) and then recorded locally.
    ChatId
}

opaque_id! {
    /// Identifier of a user, used for authorship and typing-indicator echoes.
    UserId
}

/// Maximum length of a team slug, in bytes.
pub const MAX_TEAM_ID_LEN: usize = 64;

/// A team identifier.
///
/// Teams are named by slugs (e.g. `"platform"`), restricted to ASCII alphanumerics,
/// `-` and `_` so they can be used directly as key prefixes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TeamId(String);

impl TeamId {
    /// Parse and validate a team slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the slug is empty, too long, or contains characters
    /// other than ASCII alphanumerics, `-` and `_`.
    pub fn new(slug: impl Into<String>) -> Result<Self, IdError> {
        let slug = slug.into();
        if slug.is_empty() || slug.len() > MAX_TEAM_ID_LEN {
            return Err(IdError::InvalidLength {
                expected: MAX_TEAM_ID_LEN,
                got: slug.len(),
            });
        }
        if !slug
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(IdError::InvalidSlug(slug));
        }
        Ok(Self(slug))
    }

    /// Return the slug.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TeamId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TeamId({})", self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TeamId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TeamId> for String {
    fn from(id: TeamId) -> Self {
        id.0
    }
}

impl AsRef<[u8]> for TeamId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input has an incorrect length.
    #[error("invalid length: expected at most {expected} bytes, got {got}")]
    InvalidLength {
        /// The maximum number of bytes.
        expected: usize,
        /// The actual number of bytes.
        got: usize,
    },

    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,

    /// The input is not a valid slug.
    #[error("invalid slug: {0:?}")]
    InvalidSlug(String),

    /// The input contains a control character.
    #[error("identifier contains a control character: {0:?}")]
    ControlCharacter(String),
}
