//! Architecture whiteboard: the home node, layers and their cabinets.

use blueprint_core::{CabinetId, LayerId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BoardError, Result};
use crate::graph::{Edge, Node, NodeData, NodeId};
use crate::types::{Cabinet, Layer, LayerType, Position, Viewport};

/// Label of the home node until the project name is known.
pub const UNTITLED_PROJECT: &str = "Untitled Project";

/// Default position of the home node.
pub const DEFAULT_HOME_POSITION: Position = Position::new(700.0, 100.0);

/// An update to a [`LayerBoard`].
///
/// Actions carry any IDs they create, so applying the same action to the same
/// state at the same instant always yields the same result.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerAction {
    /// Add a layer connected to the home node and select it.
    CreateLayer {
        /// ID of the new layer.
        layer_id: LayerId,
        /// Display label.
        label: String,
        /// Architectural role.
        layer_type: LayerType,
        /// Canvas position.
        position: Position,
        /// Fill color, defaults to [`Layer::DEFAULT_COLOR`].
        color: Option<String>,
        /// Border color, defaults to [`Layer::DEFAULT_BORDER_COLOR`].
        border_color: Option<String>,
    },
    /// Move the home node or a layer.
    MoveNode {
        /// Node to move.
        node: NodeId,
        /// New position.
        position: Position,
    },
    /// Change a layer's label.
    RenameLayer {
        /// Layer to rename.
        layer_id: LayerId,
        /// New label.
        label: String,
    },
    /// Show or hide a layer.
    SetVisibility {
        /// Layer to change.
        layer_id: LayerId,
        /// Whether the layer is shown.
        visible: bool,
    },
    /// Remove a layer and every edge touching it.
    DeleteLayer {
        /// Layer to remove.
        layer_id: LayerId,
    },
    /// Add a cabinet to a layer.
    AddCabinet {
        /// Owning layer.
        layer_id: LayerId,
        /// ID of the new cabinet.
        cabinet_id: CabinetId,
        /// Display name.
        name: String,
        /// Optional description.
        description: Option<String>,
    },
    /// Change a cabinet's name and/or description.
    UpdateCabinet {
        /// Owning layer.
        layer_id: LayerId,
        /// Cabinet to change.
        cabinet_id: CabinetId,
        /// New name, if changing.
        name: Option<String>,
        /// New description, if changing.
        description: Option<String>,
    },
    /// Remove a cabinet from a layer.
    DeleteCabinet {
        /// Owning layer.
        layer_id: LayerId,
        /// Cabinet to remove.
        cabinet_id: CabinetId,
    },
    /// Select a layer, or clear the selection.
    SelectLayer(Option<LayerId>),
    /// Record the canvas viewport.
    SetViewport(Viewport),
    /// Rename the project (and therefore the home node).
    SetProjectName(String),
}

impl LayerAction {
    /// Build a `CreateLayer` action with a fresh ID and default colors.
    #[must_use]
    pub fn create_layer(label: impl Into<String>, layer_type: LayerType, position: Position) -> Self {
        Self::CreateLayer {
            layer_id: LayerId::generate(),
            label: label.into(),
            layer_type,
            position,
            color: None,
            border_color: None,
        }
    }

    /// Build an `AddCabinet` action with a fresh ID.
    #[must_use]
    pub fn add_cabinet(layer_id: LayerId, name: impl Into<String>, description: Option<String>) -> Self {
        Self::AddCabinet {
            layer_id,
            cabinet_id: CabinetId::generate(),
            name: name.into(),
            description,
        }
    }
}

/// Layer canvas state for a single project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerBoard {
    project_id: ProjectId,
    project_name: Option<String>,
    home_position: Position,
    layers: Vec<Layer>,
    edges: Vec<Edge>,
    selected_layer: Option<LayerId>,
    viewport: Viewport,
}

impl LayerBoard {
    /// Create an empty board for a project.
    #[must_use]
    pub fn new(project_id: ProjectId, project_name: Option<String>) -> Self {
        Self {
            project_id,
            project_name,
            home_position: DEFAULT_HOME_POSITION,
            layers: Vec::new(),
            edges: Vec::new(),
            selected_layer: None,
            viewport: Viewport::default(),
        }
    }

    /// Apply an action.
    ///
    /// # Errors
    ///
    /// Returns an error if the action references an unknown layer or cabinet,
    /// reuses an existing ID, or sets a blank label. The board is unchanged on error.
    pub fn apply(&mut self, action: LayerAction, now: DateTime<Utc>) -> Result<()> {
        match action {
            LayerAction::CreateLayer {
                layer_id,
                label,
                layer_type,
                position,
                color,
                border_color,
            } => {
                let label = non_blank(label)?;
                if self.layer(&layer_id).is_some() {
                    return Err(BoardError::DuplicateId(layer_id.to_string()));
                }
                self.layers.push(Layer {
                    layer_id,
                    label,
                    layer_type,
                    position,
                    cabinets: Vec::new(),
                    is_visible: true,
                    color: color.unwrap_or_else(|| Layer::DEFAULT_COLOR.to_string()),
                    border_color: border_color
                        .unwrap_or_else(|| Layer::DEFAULT_BORDER_COLOR.to_string()),
                    created_at: now,
                    updated_at: now,
                });
                self.edges.push(Edge::home_to_layer(layer_id));
                self.selected_layer = Some(layer_id);
            }
            LayerAction::MoveNode { node, position } => match node {
                NodeId::Home => self.home_position = position,
                NodeId::Layer(layer_id) => {
                    let layer = self.layer_mut(&layer_id)?;
                    layer.position = position;
                    layer.updated_at = now;
                }
                NodeId::Table(_) => return Err(BoardError::ForeignNode(node)),
            },
            LayerAction::RenameLayer { layer_id, label } => {
                let label = non_blank(label)?;
                let layer = self.layer_mut(&layer_id)?;
                layer.label = label;
                layer.updated_at = now;
            }
            LayerAction::SetVisibility { layer_id, visible } => {
                let layer = self.layer_mut(&layer_id)?;
                layer.is_visible = visible;
                layer.updated_at = now;
            }
            LayerAction::DeleteLayer { layer_id } => {
                self.layer(&layer_id)
                    .ok_or(BoardError::LayerNotFound(layer_id))?;
                self.layers.retain(|l| l.layer_id != layer_id);
                let node = NodeId::Layer(layer_id);
                self.edges.retain(|e| !e.touches(&node));
                if self.selected_layer == Some(layer_id) {
                    self.selected_layer = None;
                }
            }
            LayerAction::AddCabinet {
                layer_id,
                cabinet_id,
                name,
                description,
            } => {
                let name = non_blank(name)?;
                if self.find_cabinet(&cabinet_id).is_some() {
                    return Err(BoardError::DuplicateId(cabinet_id.to_string()));
                }
                let layer = self.layer_mut(&layer_id)?;
                layer.cabinets.push(Cabinet {
                    cabinet_id,
                    name,
                    description,
                    created_at: now,
                    updated_at: now,
                });
                layer.updated_at = now;
            }
            LayerAction::UpdateCabinet {
                layer_id,
                cabinet_id,
                name,
                description,
            } => {
                let name = name.map(non_blank).transpose()?;
                let layer = self.layer_mut(&layer_id)?;
                let cabinet = layer
                    .cabinets
                    .iter_mut()
                    .find(|c| c.cabinet_id == cabinet_id)
                    .ok_or(BoardError::CabinetNotFound(cabinet_id))?;
                if let Some(name) = name {
                    cabinet.name = name;
                }
                if description.is_some() {
                    cabinet.description = description;
                }
                cabinet.updated_at = now;
                layer.updated_at = now;
            }
            LayerAction::DeleteCabinet {
                layer_id,
                cabinet_id,
            } => {
                let layer = self.layer_mut(&layer_id)?;
                let before = layer.cabinets.len();
                layer.cabinets.retain(|c| c.cabinet_id != cabinet_id);
                if layer.cabinets.len() == before {
                    return Err(BoardError::CabinetNotFound(cabinet_id));
                }
                layer.updated_at = now;
            }
            LayerAction::SelectLayer(selection) => {
                if let Some(layer_id) = selection {
                    self.layer(&layer_id)
                        .ok_or(BoardError::LayerNotFound(layer_id))?;
                }
                self.selected_layer = selection;
            }
            LayerAction::SetViewport(viewport) => self.viewport = viewport,
            LayerAction::SetProjectName(name) => self.project_name = Some(non_blank(name)?),
        }
        Ok(())
    }

    /// The project this board belongs to.
    #[must_use]
    pub const fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// The label shown on the home node.
    #[must_use]
    pub fn project_name(&self) -> &str {
        self.project_name.as_deref().unwrap_or(UNTITLED_PROJECT)
    }

    /// All layers in creation order.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Find a layer by ID.
    #[must_use]
    pub fn layer(&self, layer_id: &LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.layer_id == *layer_id)
    }

    /// Layers with the given role.
    #[must_use]
    pub fn layers_of_type(&self, layer_type: LayerType) -> Vec<&Layer> {
        self.layers
            .iter()
            .filter(|l| l.layer_type == layer_type)
            .collect()
    }

    /// Find a cabinet in any layer, returning it with its owning layer.
    #[must_use]
    pub fn find_cabinet(&self, cabinet_id: &CabinetId) -> Option<(&Layer, &Cabinet)> {
        self.layers
            .iter()
            .find_map(|l| l.cabinet(cabinet_id).map(|c| (l, c)))
    }

    /// The selected layer, if any.
    #[must_use]
    pub const fn selected_layer(&self) -> Option<&LayerId> {
        self.selected_layer.as_ref()
    }

    /// The canvas viewport.
    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Nodes for rendering: the home node first, then layers in creation order.
    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        let home = Node {
            id: NodeId::Home,
            position: self.home_position,
            data: NodeData::Home {
                label: self.project_name().to_string(),
            },
            deletable: false,
            draggable: true,
            hidden: false,
        };

        std::iter::once(home)
            .chain(self.layers.iter().map(|layer| Node {
                id: NodeId::Layer(layer.layer_id),
                position: layer.position,
                data: NodeData::Layer {
                    label: layer.label.clone(),
                    layer_type: layer.layer_type,
                    cabinets: layer.cabinets.clone(),
                    color: layer.color.clone(),
                    border_color: layer.border_color.clone(),
                },
                deletable: true,
                draggable: true,
                hidden: !layer.is_visible,
            }))
            .collect()
    }

    /// Edges for rendering.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    fn layer_mut(&mut self, layer_id: &LayerId) -> Result<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|l| l.layer_id == *layer_id)
            .ok_or(BoardError::LayerNotFound(*layer_id))
    }
}

/// Trim a label and reject it if nothing is left.
pub(crate) fn non_blank(label: String) -> Result<String> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        Err(BoardError::EmptyLabel)
    } else if trimmed.len() == label.len() {
        Ok(label)
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> LayerBoard {
        LayerBoard::new(ProjectId::generate(), None)
    }

    fn create(board: &mut LayerBoard, label: &str, layer_type: LayerType) -> LayerId {
        let action = LayerAction::create_layer(label, layer_type, Position::new(0.0, 300.0));
        let LayerAction::CreateLayer { layer_id, .. } = action else {
            unreachable!()
        };
        board.apply(action, Utc::now()).unwrap();
        layer_id
    }

    #[test]
    fn home_node_comes_first() {
        let mut board = board();
        let nodes = board.nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, NodeId::Home);
        assert!(!nodes[0].deletable);
        assert_eq!(
            nodes[0].data,
            NodeData::Home {
                label: UNTITLED_PROJECT.to_string()
            }
        );

        board
            .apply(LayerAction::SetProjectName("Shop".into()), Utc::now())
            .unwrap();
        assert_eq!(
            board.nodes()[0].data,
            NodeData::Home {
                label: "Shop".to_string()
            }
        );
    }

    #[test]
    fn create_layer_links_home_and_selects() {
        let mut board = board();
        let layer_id = create(&mut board, "API", LayerType::Backend);

        assert_eq!(board.selected_layer(), Some(&layer_id));
        assert_eq!(board.edges().len(), 1);
        assert_eq!(board.edges()[0].source, NodeId::Home);
        assert_eq!(board.edges()[0].target, NodeId::Layer(layer_id));

        let layer = board.layer(&layer_id).unwrap();
        assert_eq!(layer.color, Layer::DEFAULT_COLOR);
        assert_eq!(layer.border_color, Layer::DEFAULT_BORDER_COLOR);
    }

    #[test]
    fn delete_layer_drops_edges_and_selection() {
        let mut board = board();
        let keep = create(&mut board, "Web", LayerType::Frontend);
        let gone = create(&mut board, "DB", LayerType::Database);

        board
            .apply(LayerAction::DeleteLayer { layer_id: gone }, Utc::now())
            .unwrap();

        assert!(board.layer(&gone).is_none());
        assert_eq!(board.selected_layer(), None);
        assert_eq!(board.edges().len(), 1);
        assert_eq!(board.edges()[0].target, NodeId::Layer(keep));
    }

    #[test]
    fn unknown_layer_is_rejected_without_change() {
        let mut board = board();
        create(&mut board, "Web", LayerType::Frontend);
        let snapshot = board.clone();

        let missing = LayerId::generate();
        let err = board
            .apply(
                LayerAction::RenameLayer {
                    layer_id: missing,
                    label: "x".into(),
                },
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(err, BoardError::LayerNotFound(missing));
        assert_eq!(board, snapshot);
    }

    #[test]
    fn blank_labels_are_rejected() {
        let mut board = board();
        let err = board
            .apply(
                LayerAction::create_layer("   ", LayerType::Custom, Position::new(0.0, 0.0)),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, BoardError::EmptyLabel);
        assert!(board.layers().is_empty());
    }

    #[test]
    fn cabinet_lifecycle() {
        let mut board = board();
        let layer_id = create(&mut board, "DB", LayerType::Database);
        let add = LayerAction::add_cabinet(layer_id, "Billing", None);
        let LayerAction::AddCabinet { cabinet_id, .. } = add else {
            unreachable!()
        };
        board.apply(add, Utc::now()).unwrap();

        board
            .apply(
                LayerAction::UpdateCabinet {
                    layer_id,
                    cabinet_id,
                    name: Some("Payments".into()),
                    description: Some("money things".into()),
                },
                Utc::now(),
            )
            .unwrap();
        let (owner, cabinet) = board.find_cabinet(&cabinet_id).unwrap();
        assert_eq!(owner.layer_id, layer_id);
        assert_eq!(cabinet.name, "Payments");
        assert_eq!(cabinet.description.as_deref(), Some("money things"));

        match &board.nodes()[1].data {
            NodeData::Layer { cabinets, .. } => assert_eq!(cabinets.len(), 1),
            other => panic!("unexpected node data: {other:?}"),
        }

        board
            .apply(
                LayerAction::DeleteCabinet {
                    layer_id,
                    cabinet_id,
                },
                Utc::now(),
            )
            .unwrap();
        assert!(board.find_cabinet(&cabinet_id).is_none());

        let err = board
            .apply(
                LayerAction::DeleteCabinet {
                    layer_id,
                    cabinet_id,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, BoardError::CabinetNotFound(cabinet_id));
    }

    #[test]
    fn move_home_and_layers() {
        let mut board = board();
        let layer_id = create(&mut board, "Web", LayerType::Frontend);

        board
            .apply(
                LayerAction::MoveNode {
                    node: NodeId::Home,
                    position: Position::new(1.0, 2.0),
                },
                Utc::now(),
            )
            .unwrap();
        board
            .apply(
                LayerAction::MoveNode {
                    node: NodeId::Layer(layer_id),
                    position: Position::new(3.0, 4.0),
                },
                Utc::now(),
            )
            .unwrap();

        let nodes = board.nodes();
        assert_eq!(nodes[0].position, Position::new(1.0, 2.0));
        assert_eq!(nodes[1].position, Position::new(3.0, 4.0));
    }

    #[test]
    fn hidden_layers_are_marked() {
        let mut board = board();
        let layer_id = create(&mut board, "Ops", LayerType::Infrastructure);
        board
            .apply(
                LayerAction::SetVisibility {
                    layer_id,
                    visible: false,
                },
                Utc::now(),
            )
            .unwrap();
        assert!(board.nodes()[1].hidden);
        assert_eq!(board.layers_of_type(LayerType::Infrastructure).len(), 1);
        assert!(board.layers_of_type(LayerType::Backend).is_empty());
    }
}
