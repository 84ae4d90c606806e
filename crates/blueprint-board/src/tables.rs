//! Database table diagrams, scoped to cabinets.

use std::collections::BTreeMap;

use blueprint_core::{CabinetId, ProjectId, RowId, TableId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BoardError, Result};
use crate::graph::{Edge, EdgeKind, HandleRef, Node, NodeData, NodeId};
use crate::layers::non_blank;
use crate::types::{DatabaseRow, DatabaseTable, HandleSide, Position, Viewport};

/// Position given to tables created without one.
pub const DEFAULT_TABLE_POSITION: Position = Position::new(100.0, 100.0);

/// Column type given to rows created without one.
pub const DEFAULT_COLUMN_TYPE: &str = "string";

/// An update to a [`TableBoard`].
#[derive(Debug, Clone, PartialEq)]
pub enum TableAction {
    /// Add a table with the default `id`/`created_at` rows.
    CreateTable {
        /// ID of the new table.
        table_id: TableId,
        /// IDs for the two default rows.
        default_rows: [RowId; 2],
        /// Cabinet the table belongs to.
        cabinet_id: CabinetId,
        /// Canvas position, defaults to [`DEFAULT_TABLE_POSITION`].
        position: Option<Position>,
    },
    /// Change a table's label.
    RenameTable {
        /// Table to rename.
        table_id: TableId,
        /// New label.
        label: String,
    },
    /// Move a table.
    MoveTable {
        /// Table to move.
        table_id: TableId,
        /// New position.
        position: Position,
    },
    /// Remove a table and every edge touching it.
    DeleteTable {
        /// Table to remove.
        table_id: TableId,
    },
    /// Append a row to a table.
    CreateRow {
        /// Owning table.
        table_id: TableId,
        /// ID of the new row.
        row_id: RowId,
        /// Column name.
        title: String,
        /// Column type, defaults to [`DEFAULT_COLUMN_TYPE`].
        column_type: Option<String>,
    },
    /// Change a row's name and type.
    UpdateRow {
        /// Owning table.
        table_id: TableId,
        /// Row to change.
        row_id: RowId,
        /// New column name.
        title: String,
        /// New column type.
        column_type: String,
    },
    /// Remove a row and every edge attached to its handles.
    DeleteRow {
        /// Owning table.
        table_id: TableId,
        /// Row to remove.
        row_id: RowId,
    },
    /// Expose a connection handle on a row.
    AddRowHandle {
        /// Owning table.
        table_id: TableId,
        /// Row to change.
        row_id: RowId,
        /// Handle side.
        side: HandleSide,
    },
    /// Hide a connection handle, dropping edges that used it.
    RemoveRowHandle {
        /// Owning table.
        table_id: TableId,
        /// Row to change.
        row_id: RowId,
        /// Handle side.
        side: HandleSide,
    },
    /// Add an edge, or replace the edge with the same ID.
    Connect(Edge),
    /// Remove an edge by ID. Unknown IDs are ignored.
    Disconnect(String),
    /// Replace every edge at once (e.g. after a bulk edit in the renderer).
    ReplaceEdges(Vec<Edge>),
    /// Scope the board to a cabinet, or clear the scope.
    SetActiveCabinet(Option<CabinetId>),
    /// Record the viewport of the active cabinet (or the global one if none).
    SetViewport(Viewport),
}

impl TableAction {
    /// Build a `CreateTable` action with fresh IDs.
    #[must_use]
    pub fn create_table(cabinet_id: CabinetId, position: Option<Position>) -> Self {
        Self::CreateTable {
            table_id: TableId::generate(),
            default_rows: [RowId::generate(), RowId::generate()],
            cabinet_id,
            position,
        }
    }

    /// Build a `CreateRow` action with a fresh ID.
    #[must_use]
    pub fn create_row(table_id: TableId, title: impl Into<String>, column_type: Option<String>) -> Self {
        Self::CreateRow {
            table_id,
            row_id: RowId::generate(),
            title: title.into(),
            column_type,
        }
    }
}

/// Table diagram state for a single project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBoard {
    project_id: ProjectId,
    tables: Vec<DatabaseTable>,
    edges: Vec<Edge>,
    active_cabinet: Option<CabinetId>,
    viewport: Viewport,
    cabinet_viewports: BTreeMap<CabinetId, Viewport>,
}

impl TableBoard {
    /// Create an empty board for a project.
    #[must_use]
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            tables: Vec::new(),
            edges: Vec::new(),
            active_cabinet: None,
            viewport: Viewport::default(),
            cabinet_viewports: BTreeMap::new(),
        }
    }

    /// Apply an action.
    ///
    /// Cabinet existence is not checked here; the owning [`crate::Blueprint`]
    /// validates cabinets against its layer board.
    ///
    /// # Errors
    ///
    /// Returns an error if the action references an unknown table or row, reuses an
    /// ID, sets a blank label, or describes an invalid edge. The board is unchanged
    /// on error.
    pub fn apply(&mut self, action: TableAction, now: DateTime<Utc>) -> Result<()> {
        match action {
            TableAction::CreateTable {
                table_id,
                default_rows: [id_row, created_row],
                cabinet_id,
                position,
            } => {
                if self.table(&table_id).is_some() {
                    return Err(BoardError::DuplicateId(table_id.to_string()));
                }
                self.tables.push(DatabaseTable {
                    table_id,
                    cabinet_id,
                    label: DatabaseTable::DEFAULT_LABEL.to_string(),
                    rows: vec![
                        DatabaseRow::new(id_row, "id", "uuid"),
                        DatabaseRow::new(created_row, "created_at", "timestamp"),
                    ],
                    position: position.unwrap_or(DEFAULT_TABLE_POSITION),
                    created_at: now,
                    updated_at: now,
                });
            }
            TableAction::RenameTable { table_id, label } => {
                let label = non_blank(label)?;
                let table = self.table_mut(&table_id)?;
                table.label = label;
                table.updated_at = now;
            }
            TableAction::MoveTable { table_id, position } => {
                let table = self.table_mut(&table_id)?;
                table.position = position;
                table.updated_at = now;
            }
            TableAction::DeleteTable { table_id } => {
                self.table(&table_id)
                    .ok_or(BoardError::TableNotFound(table_id))?;
                self.tables.retain(|t| t.table_id != table_id);
                let node = NodeId::Table(table_id);
                self.edges.retain(|e| !e.touches(&node));
            }
            TableAction::CreateRow {
                table_id,
                row_id,
                title,
                column_type,
            } => {
                let title = non_blank(title)?;
                let table = self.table_mut(&table_id)?;
                if table.row(&row_id).is_some() {
                    return Err(BoardError::DuplicateId(row_id.to_string()));
                }
                table.rows.push(DatabaseRow::new(
                    row_id,
                    title,
                    column_type.unwrap_or_else(|| DEFAULT_COLUMN_TYPE.to_string()),
                ));
                table.updated_at = now;
            }
            TableAction::UpdateRow {
                table_id,
                row_id,
                title,
                column_type,
            } => {
                let title = non_blank(title)?;
                let table = self.table_mut(&table_id)?;
                let row = row_mut(table, row_id)?;
                row.title = title;
                row.column_type = column_type;
                table.updated_at = now;
            }
            TableAction::DeleteRow { table_id, row_id } => {
                let table = self.table_mut(&table_id)?;
                row_mut(table, row_id)?;
                table.rows.retain(|r| r.row_id != row_id);
                table.updated_at = now;
                self.edges.retain(|e| !e.uses_row(&row_id));
            }
            TableAction::AddRowHandle {
                table_id,
                row_id,
                side,
            } => {
                let table = self.table_mut(&table_id)?;
                set_handle(row_mut(table, row_id)?, side, true);
                table.updated_at = now;
            }
            TableAction::RemoveRowHandle {
                table_id,
                row_id,
                side,
            } => {
                let table = self.table_mut(&table_id)?;
                set_handle(row_mut(table, row_id)?, side, false);
                table.updated_at = now;
                let handle = HandleRef::new(row_id, side);
                self.edges.retain(|e| !e.uses_handle(&handle));
            }
            TableAction::Connect(edge) => {
                self.validate_edge(&edge)?;
                match self.edges.iter_mut().find(|e| e.id == edge.id) {
                    Some(existing) => *existing = edge,
                    None => self.edges.push(edge),
                }
            }
            TableAction::Disconnect(edge_id) => self.edges.retain(|e| e.id != edge_id),
            TableAction::ReplaceEdges(edges) => {
                for edge in &edges {
                    self.validate_edge(edge)?;
                }
                self.edges = edges;
            }
            TableAction::SetActiveCabinet(cabinet_id) => self.active_cabinet = cabinet_id,
            TableAction::SetViewport(viewport) => match self.active_cabinet {
                Some(cabinet_id) => {
                    self.cabinet_viewports.insert(cabinet_id, viewport);
                }
                None => self.viewport = viewport,
            },
        }
        Ok(())
    }

    /// The project this board belongs to.
    #[must_use]
    pub const fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// All tables in creation order.
    #[must_use]
    pub fn tables(&self) -> &[DatabaseTable] {
        &self.tables
    }

    /// Find a table by ID.
    #[must_use]
    pub fn table(&self, table_id: &TableId) -> Option<&DatabaseTable> {
        self.tables.iter().find(|t| t.table_id == *table_id)
    }

    /// The cabinet the board is scoped to.
    #[must_use]
    pub const fn active_cabinet(&self) -> Option<&CabinetId> {
        self.active_cabinet.as_ref()
    }

    /// Tables of one cabinet.
    #[must_use]
    pub fn cabinet_tables(&self, cabinet_id: &CabinetId) -> Vec<&DatabaseTable> {
        self.tables
            .iter()
            .filter(|t| t.cabinet_id == *cabinet_id)
            .collect()
    }

    /// Tables of the active cabinet; empty when no cabinet is active.
    #[must_use]
    pub fn active_tables(&self) -> Vec<&DatabaseTable> {
        self.active_cabinet
            .map(|c| self.cabinet_tables(&c))
            .unwrap_or_default()
    }

    /// Nodes of the active cabinet.
    #[must_use]
    pub fn active_nodes(&self) -> Vec<Node> {
        self.active_tables().into_iter().map(table_node).collect()
    }

    /// Edges whose endpoints are both in the active cabinet.
    #[must_use]
    pub fn active_edges(&self) -> Vec<&Edge> {
        let ids: Vec<NodeId> = self
            .active_tables()
            .iter()
            .map(|t| NodeId::Table(t.table_id))
            .collect();
        self.edges
            .iter()
            .filter(|e| ids.contains(&e.source) && ids.contains(&e.target))
            .collect()
    }

    /// Nodes for every table in the project.
    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        self.tables.iter().map(table_node).collect()
    }

    /// Every edge in the project.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Viewport of the active cabinet, falling back to the global viewport.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.active_cabinet
            .and_then(|c| self.cabinet_viewports.get(&c).copied())
            .unwrap_or(self.viewport)
    }

    /// Drop every table of a cabinet along with their edges.
    pub(crate) fn remove_cabinet(&mut self, cabinet_id: &CabinetId) {
        let removed: Vec<NodeId> = self
            .tables
            .iter()
            .filter(|t| t.cabinet_id == *cabinet_id)
            .map(|t| NodeId::Table(t.table_id))
            .collect();
        self.tables.retain(|t| t.cabinet_id != *cabinet_id);
        self.edges
            .retain(|e| !removed.iter().any(|node| e.touches(node)));
        self.cabinet_viewports.remove(cabinet_id);
        if self.active_cabinet.as_ref() == Some(cabinet_id) {
            self.active_cabinet = None;
        }
    }

    fn table_mut(&mut self, table_id: &TableId) -> Result<&mut DatabaseTable> {
        self.tables
            .iter_mut()
            .find(|t| t.table_id == *table_id)
            .ok_or(BoardError::TableNotFound(*table_id))
    }

    fn validate_edge(&self, edge: &Edge) -> Result<()> {
        let invalid = |reason| BoardError::InvalidEdge {
            id: edge.id.clone(),
            reason,
        };

        if edge.kind != EdgeKind::RowConnection {
            return Err(invalid("table edges must be row connections"));
        }
        let (NodeId::Table(source), NodeId::Table(target)) = (edge.source, edge.target) else {
            return Err(invalid("both endpoints must be tables"));
        };
        if source == target {
            return Err(invalid("a table cannot connect to itself"));
        }
        let (Some(source_handle), Some(target_handle)) = (edge.source_handle, edge.target_handle)
        else {
            return Err(invalid("row connections need both handles"));
        };
        if source_handle.side != HandleSide::Right || target_handle.side != HandleSide::Left {
            return Err(invalid("edges run from a right handle to a left handle"));
        }

        self.check_handle(source, source_handle)?;
        self.check_handle(target, target_handle)
    }

    fn check_handle(&self, table_id: TableId, handle: HandleRef) -> Result<()> {
        let table = self
            .table(&table_id)
            .ok_or(BoardError::TableNotFound(table_id))?;
        let row = table.row(&handle.row).ok_or(BoardError::RowNotFound {
            table: table_id,
            row: handle.row,
        })?;
        if row.has_handle(handle.side) {
            Ok(())
        } else {
            Err(BoardError::HandleMissing {
                row: handle.row,
                side: handle.side,
            })
        }
    }
}

fn row_mut(table: &mut DatabaseTable, row_id: RowId) -> Result<&mut DatabaseRow> {
    let table_id = table.table_id;
    table
        .rows
        .iter_mut()
        .find(|r| r.row_id == row_id)
        .ok_or(BoardError::RowNotFound {
            table: table_id,
            row: row_id,
        })
}

fn set_handle(row: &mut DatabaseRow, side: HandleSide, present: bool) {
    match side {
        HandleSide::Left => row.has_left_handle = present,
        HandleSide::Right => row.has_right_handle = present,
    }
}

fn table_node(table: &DatabaseTable) -> Node {
    Node {
        id: NodeId::Table(table.table_id),
        position: table.position,
        data: NodeData::Table {
            label: table.label.clone(),
            rows: table.rows.clone(),
        },
        deletable: true,
        draggable: true,
        hidden: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        board: TableBoard,
        cabinet: CabinetId,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                board: TableBoard::new(ProjectId::generate()),
                cabinet: CabinetId::generate(),
            }
        }

        fn table(&mut self, cabinet: CabinetId) -> (TableId, [RowId; 2]) {
            let action = TableAction::create_table(cabinet, None);
            let TableAction::CreateTable {
                table_id,
                default_rows,
                ..
            } = action
            else {
                unreachable!()
            };
            self.board.apply(action, Utc::now()).unwrap();
            (table_id, default_rows)
        }

        fn handle(&mut self, table_id: TableId, row_id: RowId, side: HandleSide) {
            self.board
                .apply(
                    TableAction::AddRowHandle {
                        table_id,
                        row_id,
                        side,
                    },
                    Utc::now(),
                )
                .unwrap();
        }

        /// Two tables in the fixture cabinet, connected `a.id -> b.id`.
        fn connected(&mut self) -> (TableId, RowId, TableId, RowId) {
            let (a, [a_id, _]) = self.table(self.cabinet);
            let (b, [b_id, _]) = self.table(self.cabinet);
            self.handle(a, a_id, HandleSide::Right);
            self.handle(b, b_id, HandleSide::Left);
            self.board
                .apply(
                    TableAction::Connect(Edge::row_connection("fk", (a, a_id), (b, b_id))),
                    Utc::now(),
                )
                .unwrap();
            (a, a_id, b, b_id)
        }
    }

    #[test]
    fn new_table_has_default_rows() {
        let mut fx = Fixture::new();
        let (table_id, _) = fx.table(fx.cabinet);
        let table = fx.board.table(&table_id).unwrap();

        assert_eq!(table.label, "New Table");
        assert_eq!(table.position, DEFAULT_TABLE_POSITION);
        let columns: Vec<_> = table
            .rows
            .iter()
            .map(|r| (r.title.as_str(), r.column_type.as_str()))
            .collect();
        assert_eq!(columns, [("id", "uuid"), ("created_at", "timestamp")]);
    }

    #[test]
    fn rows_default_to_string() {
        let mut fx = Fixture::new();
        let (table_id, _) = fx.table(fx.cabinet);
        fx.board
            .apply(TableAction::create_row(table_id, "email", None), Utc::now())
            .unwrap();

        let row = fx.board.table(&table_id).unwrap().rows.last().unwrap();
        assert_eq!(row.title, "email");
        assert_eq!(row.column_type, DEFAULT_COLUMN_TYPE);
    }

    #[test]
    fn connect_requires_exposed_handles() {
        let mut fx = Fixture::new();
        let (a, [a_id, _]) = fx.table(fx.cabinet);
        let (b, [b_id, _]) = fx.table(fx.cabinet);

        let err = fx
            .board
            .apply(
                TableAction::Connect(Edge::row_connection("fk", (a, a_id), (b, b_id))),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            BoardError::HandleMissing {
                row: a_id,
                side: HandleSide::Right
            }
        );
        assert!(fx.board.edges().is_empty());
    }

    #[test]
    fn connect_upserts_by_id() {
        let mut fx = Fixture::new();
        let (a, a_id, b, _) = fx.connected();
        let b_created = fx.board.table(&b).unwrap().rows[1].row_id;
        fx.handle(b, b_created, HandleSide::Left);

        fx.board
            .apply(
                TableAction::Connect(Edge::row_connection("fk", (a, a_id), (b, b_created))),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(fx.board.edges().len(), 1);
        assert_eq!(
            fx.board.edges()[0].target_handle,
            Some(HandleRef::new(b_created, HandleSide::Left))
        );
    }

    #[test]
    fn self_loops_are_rejected() {
        let mut fx = Fixture::new();
        let (a, [a_id, a_created]) = fx.table(fx.cabinet);
        fx.handle(a, a_id, HandleSide::Right);
        fx.handle(a, a_created, HandleSide::Left);

        let err = fx
            .board
            .apply(
                TableAction::Connect(Edge::row_connection("loop", (a, a_id), (a, a_created))),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, BoardError::InvalidEdge { .. }));
    }

    #[test]
    fn removing_a_handle_drops_its_edges() {
        let mut fx = Fixture::new();
        let (_, _, b, b_id) = fx.connected();

        fx.board
            .apply(
                TableAction::RemoveRowHandle {
                    table_id: b,
                    row_id: b_id,
                    side: HandleSide::Left,
                },
                Utc::now(),
            )
            .unwrap();

        assert!(fx.board.edges().is_empty());
        assert!(!fx.board.table(&b).unwrap().rows[0].has_left_handle);
    }

    #[test]
    fn deleting_a_row_drops_its_edges() {
        let mut fx = Fixture::new();
        let (a, a_id, _, _) = fx.connected();

        fx.board
            .apply(
                TableAction::DeleteRow {
                    table_id: a,
                    row_id: a_id,
                },
                Utc::now(),
            )
            .unwrap();

        assert!(fx.board.edges().is_empty());
        assert_eq!(fx.board.table(&a).unwrap().rows.len(), 1);
    }

    #[test]
    fn deleting_a_table_drops_its_edges() {
        let mut fx = Fixture::new();
        let (a, _, b, _) = fx.connected();

        fx.board
            .apply(TableAction::DeleteTable { table_id: a }, Utc::now())
            .unwrap();

        assert!(fx.board.table(&a).is_none());
        assert!(fx.board.table(&b).is_some());
        assert!(fx.board.edges().is_empty());
    }

    #[test]
    fn active_cabinet_scopes_nodes_and_edges() {
        let mut fx = Fixture::new();
        fx.connected();
        let other = CabinetId::generate();
        let (lonely, _) = fx.table(other);

        assert!(fx.board.active_nodes().is_empty());
        assert!(fx.board.active_edges().is_empty());

        fx.board
            .apply(TableAction::SetActiveCabinet(Some(fx.cabinet)), Utc::now())
            .unwrap();
        assert_eq!(fx.board.active_nodes().len(), 2);
        assert_eq!(fx.board.active_edges().len(), 1);

        fx.board
            .apply(TableAction::SetActiveCabinet(Some(other)), Utc::now())
            .unwrap();
        let nodes = fx.board.active_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, NodeId::Table(lonely));
        assert!(fx.board.active_edges().is_empty());

        assert_eq!(fx.board.nodes().len(), 3);
    }

    #[test]
    fn viewports_are_per_cabinet() {
        let mut fx = Fixture::new();
        let global = Viewport {
            x: 5.0,
            y: 5.0,
            zoom: 0.5,
        };
        let scoped = Viewport {
            x: -10.0,
            y: 20.0,
            zoom: 2.0,
        };

        fx.board
            .apply(TableAction::SetViewport(global), Utc::now())
            .unwrap();
        fx.board
            .apply(TableAction::SetActiveCabinet(Some(fx.cabinet)), Utc::now())
            .unwrap();
        assert_eq!(fx.board.viewport(), global);

        fx.board
            .apply(TableAction::SetViewport(scoped), Utc::now())
            .unwrap();
        assert_eq!(fx.board.viewport(), scoped);

        fx.board
            .apply(TableAction::SetActiveCabinet(None), Utc::now())
            .unwrap();
        assert_eq!(fx.board.viewport(), global);
    }

    #[test]
    fn remove_cabinet_drops_tables_and_scope() {
        let mut fx = Fixture::new();
        fx.connected();
        fx.board
            .apply(TableAction::SetActiveCabinet(Some(fx.cabinet)), Utc::now())
            .unwrap();

        let cabinet = fx.cabinet;
        fx.board.remove_cabinet(&cabinet);

        assert!(fx.board.tables().is_empty());
        assert!(fx.board.edges().is_empty());
        assert_eq!(fx.board.active_cabinet(), None);
    }
}
