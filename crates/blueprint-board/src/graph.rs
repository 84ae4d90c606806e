//! Typed node/edge graph handed to the diagram renderer.
//!
//! Node payloads are a tagged enum rather than an untyped property bag, so a
//! renderer can never receive a layer node without its layer type or a table
//! node without its rows.

use blueprint_core::{LayerId, RowId, TableId};
use serde::{Deserialize, Serialize};

use crate::types::{Cabinet, DatabaseRow, HandleSide, LayerType, Position};

/// Identity of a node on either canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NodeId {
    /// The project's root node on the layer canvas.
    Home,
    /// A layer node.
    Layer(LayerId),
    /// A table diagram node.
    Table(TableId),
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Home => f.write_str("home"),
            Self::Layer(id) => write!(f, "{id}"),
            Self::Table(id) => write!(f, "{id}"),
        }
    }
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeData {
    /// Root node labelled with the project name.
    Home {
        /// Project name.
        label: String,
    },
    /// Layer node.
    Layer {
        /// Layer label.
        label: String,
        /// Architectural role.
        layer_type: LayerType,
        /// Cabinets listed inside the node.
        cabinets: Vec<Cabinet>,
        /// Fill color.
        color: String,
        /// Border color.
        border_color: String,
    },
    /// Table diagram node.
    Table {
        /// Table label.
        label: String,
        /// Column rows.
        rows: Vec<DatabaseRow>,
    },
}

/// A node ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identity.
    pub id: NodeId,
    /// Canvas position.
    pub position: Position,
    /// Typed payload.
    pub data: NodeData,
    /// Whether the user may delete the node.
    pub deletable: bool,
    /// Whether the user may drag the node.
    pub draggable: bool,
    /// Whether the node is hidden.
    pub hidden: bool,
}

/// A connection point on a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleRef {
    /// Row that owns the handle.
    pub row: RowId,
    /// Side of the row.
    pub side: HandleSide,
}

impl HandleRef {
    /// Create a handle reference.
    #[must_use]
    pub const fn new(row: RowId, side: HandleSide) -> Self {
        Self { row, side }
    }

    /// Renderer-facing handle name: `<row>-target` for left, `<row>-source` for right.
    #[must_use]
    pub fn handle_id(&self) -> String {
        match self.side {
            HandleSide::Left => format!("{}-target", self.row),
            HandleSide::Right => format!("{}-source", self.row),
        }
    }
}

/// How an edge is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Curved arrow from the home node to a layer.
    Bezier,
    /// Row-to-row relation between table diagrams.
    RowConnection,
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Edge identifier, unique within a board.
    pub id: String,
    /// Source node.
    pub source: NodeId,
    /// Target node.
    pub target: NodeId,
    /// Handle on the source node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<HandleRef>,
    /// Handle on the target node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<HandleRef>,
    /// Drawing style.
    pub kind: EdgeKind,
}

impl Edge {
    /// The edge linking the home node to a layer.
    #[must_use]
    pub fn home_to_layer(layer_id: LayerId) -> Self {
        Self {
            id: format!("home-{layer_id}"),
            source: NodeId::Home,
            target: NodeId::Layer(layer_id),
            source_handle: None,
            target_handle: None,
            kind: EdgeKind::Bezier,
        }
    }

    /// A row-to-row edge from `source`'s right handle to `target`'s left handle.
    #[must_use]
    pub fn row_connection(
        id: impl Into<String>,
        source: (TableId, RowId),
        target: (TableId, RowId),
    ) -> Self {
        Self {
            id: id.into(),
            source: NodeId::Table(source.0),
            target: NodeId::Table(target.0),
            source_handle: Some(HandleRef::new(source.1, HandleSide::Right)),
            target_handle: Some(HandleRef::new(target.1, HandleSide::Left)),
            kind: EdgeKind::RowConnection,
        }
    }

    /// Whether either endpoint is the given node.
    #[must_use]
    pub fn touches(&self, node: &NodeId) -> bool {
        self.source == *node || self.target == *node
    }

    /// Whether either handle is the given one.
    #[must_use]
    pub fn uses_handle(&self, handle: &HandleRef) -> bool {
        self.source_handle.as_ref() == Some(handle) || self.target_handle.as_ref() == Some(handle)
    }

    /// Whether either handle belongs to the given row.
    #[must_use]
    pub fn uses_row(&self, row: &RowId) -> bool {
        self.source_handle.is_some_and(|h| h.row == *row)
            || self.target_handle.is_some_and(|h| h.row == *row)
    }
}
