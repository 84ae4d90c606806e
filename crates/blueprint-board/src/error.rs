//! Error types for whiteboard state updates.

use blueprint_core::{CabinetId, LayerId, RowId, TableId};
use thiserror::Error;

use crate::graph::NodeId;
use crate::types::HandleSide;

/// A result type using `BoardError`.
pub type Result<T> = std::result::Result<T, BoardError>;

/// Errors returned when an action cannot be applied to a board.
///
/// A rejected action leaves the board unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// The layer does not exist on this board.
    #[error("layer not found: {0}")]
    LayerNotFound(LayerId),

    /// The cabinet does not exist in any layer.
    #[error("cabinet not found: {0}")]
    CabinetNotFound(CabinetId),

    /// The table does not exist on this board.
    #[error("table not found: {0}")]
    TableNotFound(TableId),

    /// The row does not exist in the table.
    #[error("row {row} not found in table {table}")]
    RowNotFound {
        /// Table that was searched.
        table: TableId,
        /// Row that was requested.
        row: RowId,
    },

    /// An edge references a handle that the row does not expose.
    #[error("row {row} has no {side:?} handle")]
    HandleMissing {
        /// Row the handle belongs to.
        row: RowId,
        /// Side of the missing handle.
        side: HandleSide,
    },

    /// An element with this ID already exists.
    #[error("duplicate id: {0}")]
    DuplicateId(String),

    /// The edge is malformed (self-loop, wrong node kinds, wrong handle sides).
    #[error("invalid edge {id}: {reason}")]
    InvalidEdge {
        /// Edge identifier.
        id: String,
        /// Why the edge was rejected.
        reason: &'static str,
    },

    /// The node belongs to the other canvas.
    #[error("node {0} does not belong on this board")]
    ForeignNode(NodeId),

    /// Labels and names must not be blank.
    #[error("label must not be empty")]
    EmptyLabel,
}
