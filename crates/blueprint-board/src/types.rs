//! Whiteboard domain types.
//!
//! These are the persisted shapes of layers, cabinets and table diagrams. The
//! graph projection in [`crate::graph`] is derived from them.

use blueprint_core::{CabinetId, LayerId, RowId, TableId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Create a position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pan and zoom of a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Horizontal pan.
    pub x: f64,
    /// Vertical pan.
    pub y: f64,
    /// Zoom factor.
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// The architectural role of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    /// Client-facing UI.
    Frontend,
    /// Services and APIs.
    Backend,
    /// Data stores; cabinets of this layer hold table diagrams.
    Database,
    /// Hosting, networking, CI.
    Infrastructure,
    /// Third-party integrations.
    Integration,
    /// Anything else.
    Custom,
}

impl LayerType {
    /// Return the lowercase name used on the wire and in the CLI.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Database => "database",
            Self::Infrastructure => "infrastructure",
            Self::Integration => "integration",
            Self::Custom => "custom",
        }
    }
}

impl std::str::FromStr for LayerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frontend" => Ok(Self::Frontend),
            "backend" => Ok(Self::Backend),
            "database" => Ok(Self::Database),
            "infrastructure" => Ok(Self::Infrastructure),
            "integration" => Ok(Self::Integration),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown layer type: {other}")),
        }
    }
}

/// A named sub-grouping within a layer. Table diagrams are scoped to a cabinet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cabinet {
    /// Unique identifier.
    pub cabinet_id: CabinetId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A layer node on the architecture whiteboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Unique identifier.
    pub layer_id: LayerId,
    /// Display label.
    pub label: String,
    /// Architectural role.
    pub layer_type: LayerType,
    /// Canvas position.
    pub position: Position,
    /// Cabinets in display order.
    pub cabinets: Vec<Cabinet>,
    /// Whether the node is shown.
    pub is_visible: bool,
    /// Fill color.
    pub color: String,
    /// Border color.
    pub border_color: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Layer {
    /// Default fill color for new layers.
    pub const DEFAULT_COLOR: &'static str = "#374151";
    /// Default border color for new layers.
    pub const DEFAULT_BORDER_COLOR: &'static str = "#6b7280";

    /// Find a cabinet by ID.
    #[must_use]
    pub fn cabinet(&self, cabinet_id: &CabinetId) -> Option<&Cabinet> {
        self.cabinets.iter().find(|c| c.cabinet_id == *cabinet_id)
    }
}

/// Which side of a row a connection handle sits on.
///
/// Left handles accept incoming edges, right handles emit outgoing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleSide {
    /// Incoming (target) handle.
    Left,
    /// Outgoing (source) handle.
    Right,
}

/// A column definition shown as a row of a table diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRow {
    /// Unique identifier.
    pub row_id: RowId,
    /// Column name.
    pub title: String,
    /// Column type (free-form, e.g. `uuid`, `timestamp`).
    pub column_type: String,
    /// Whether the row exposes an incoming handle.
    #[serde(default)]
    pub has_left_handle: bool,
    /// Whether the row exposes an outgoing handle.
    #[serde(default)]
    pub has_right_handle: bool,
}

impl DatabaseRow {
    /// Create a row without handles.
    #[must_use]
    pub fn new(row_id: RowId, title: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            row_id,
            title: title.into(),
            column_type: column_type.into(),
            has_left_handle: false,
            has_right_handle: false,
        }
    }

    /// Whether the row exposes a handle on the given side.
    #[must_use]
    pub const fn has_handle(&self, side: HandleSide) -> bool {
        match side {
            HandleSide::Left => self.has_left_handle,
            HandleSide::Right => self.has_right_handle,
        }
    }
}

/// A database table diagram scoped to a cabinet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseTable {
    /// Unique identifier.
    pub table_id: TableId,
    /// Cabinet the table belongs to.
    pub cabinet_id: CabinetId,
    /// Display label.
    pub label: String,
    /// Column rows in display order.
    pub rows: Vec<DatabaseRow>,
    /// Canvas position.
    pub position: Position,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl DatabaseTable {
    /// Label given to freshly created tables.
    pub const DEFAULT_LABEL: &'static str = "New Table";

    /// Find a row by ID.
    #[must_use]
    pub fn row(&self, row_id: &RowId) -> Option<&DatabaseRow> {
        self.rows.iter().find(|r| r.row_id == *row_id)
    }
}
