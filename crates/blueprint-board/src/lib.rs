//! Whiteboard state for blueprint projects.
//!
//! A project's whiteboard has two canvases:
//!
//! - **Layers** ([`LayerBoard`]): the architecture overview. A fixed home node
//!   labelled with the project name fans out to layers, each holding cabinets.
//! - **Tables** ([`TableBoard`]): database table diagrams, each scoped to a
//!   cabinet, connected row-to-row through left/right handles.
//!
//! Both canvases are plain state machines: callers build an action, apply it
//! with the current time, and read typed nodes/edges back for rendering.
//! [`Blueprint`] bundles the two and enforces the rules that span them.
//!
//! # Example
//!
//! ```
//! use blueprint_board::{Blueprint, BlueprintAction, LayerAction, LayerType, Position, TableAction};
//! use blueprint_core::ProjectId;
//! use chrono::Utc;
//!
//! let mut blueprint = Blueprint::new(ProjectId::generate(), Some("Shop".into()));
//!
//! let layer = LayerAction::create_layer("Postgres", LayerType::Database, Position::new(400.0, 300.0));
//! let LayerAction::CreateLayer { layer_id, .. } = layer else { unreachable!() };
//! blueprint.apply(layer.into(), Utc::now()).unwrap();
//!
//! let cabinet = LayerAction::add_cabinet(layer_id, "Billing", None);
//! let LayerAction::AddCabinet { cabinet_id, .. } = cabinet else { unreachable!() };
//! blueprint.apply(cabinet.into(), Utc::now()).unwrap();
//!
//! blueprint
//!     .apply(TableAction::create_table(cabinet_id, None).into(), Utc::now())
//!     .unwrap();
//! assert_eq!(blueprint.tables().cabinet_tables(&cabinet_id).len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod graph;
pub mod layers;
pub mod tables;
pub mod types;

use blueprint_core::{CabinetId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::{BoardError, Result};
pub use graph::{Edge, EdgeKind, HandleRef, Node, NodeData, NodeId};
pub use layers::{LayerAction, LayerBoard, DEFAULT_HOME_POSITION, UNTITLED_PROJECT};
pub use tables::{TableAction, TableBoard, DEFAULT_COLUMN_TYPE, DEFAULT_TABLE_POSITION};
pub use types::{
    Cabinet, DatabaseRow, DatabaseTable, HandleSide, Layer, LayerType, Position, Viewport,
};

/// An action on either canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum BlueprintAction {
    /// Layer canvas action.
    Layer(LayerAction),
    /// Table canvas action.
    Table(TableAction),
}

impl From<LayerAction> for BlueprintAction {
    fn from(action: LayerAction) -> Self {
        Self::Layer(action)
    }
}

impl From<TableAction> for BlueprintAction {
    fn from(action: TableAction) -> Self {
        Self::Table(action)
    }
}

/// The complete whiteboard of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    layers: LayerBoard,
    tables: TableBoard,
}

impl Blueprint {
    /// Create an empty whiteboard.
    #[must_use]
    pub fn new(project_id: ProjectId, project_name: Option<String>) -> Self {
        Self {
            layers: LayerBoard::new(project_id, project_name),
            tables: TableBoard::new(project_id),
        }
    }

    /// The project this whiteboard belongs to.
    #[must_use]
    pub const fn project_id(&self) -> &ProjectId {
        self.layers.project_id()
    }

    /// The layer canvas.
    #[must_use]
    pub const fn layers(&self) -> &LayerBoard {
        &self.layers
    }

    /// The table canvas.
    #[must_use]
    pub const fn tables(&self) -> &TableBoard {
        &self.tables
    }

    /// Apply an action to the matching canvas.
    ///
    /// Tables may only be created in, and scoped to, cabinets that exist.
    /// Deleting a cabinet or a layer also deletes the tables in its cabinets.
    ///
    /// # Errors
    ///
    /// Returns the canvas error, or [`BoardError::CabinetNotFound`] when a table
    /// action names a cabinet no layer holds. The whiteboard is unchanged on error.
    pub fn apply(&mut self, action: BlueprintAction, now: DateTime<Utc>) -> Result<()> {
        match action {
            BlueprintAction::Layer(action) => {
                let orphaned = self.cabinets_removed_by(&action);
                self.layers.apply(action, now)?;
                for cabinet_id in &orphaned {
                    self.tables.remove_cabinet(cabinet_id);
                }
                Ok(())
            }
            BlueprintAction::Table(action) => {
                match &action {
                    TableAction::CreateTable { cabinet_id, .. }
                    | TableAction::SetActiveCabinet(Some(cabinet_id)) => {
                        self.require_cabinet(cabinet_id)?;
                    }
                    _ => {}
                }
                self.tables.apply(action, now)
            }
        }
    }

    fn require_cabinet(&self, cabinet_id: &CabinetId) -> Result<()> {
        self.layers
            .find_cabinet(cabinet_id)
            .map(|_| ())
            .ok_or(BoardError::CabinetNotFound(*cabinet_id))
    }

    fn cabinets_removed_by(&self, action: &LayerAction) -> Vec<CabinetId> {
        match action {
            LayerAction::DeleteCabinet {
                layer_id,
                cabinet_id,
            } => self
                .layers
                .layer(layer_id)
                .and_then(|l| l.cabinet(cabinet_id))
                .map(|c| vec![c.cabinet_id])
                .unwrap_or_default(),
            LayerAction::DeleteLayer { layer_id } => self
                .layers
                .layer(layer_id)
                .map(|l| l.cabinets.iter().map(|c| c.cabinet_id).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}
