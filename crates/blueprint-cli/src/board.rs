//! `blueprint board` commands.

use std::str::FromStr;

use anyhow::Context as _;
use blueprint_board::{
    Blueprint, BlueprintAction, Edge, EdgeKind, HandleSide, LayerAction, LayerType, NodeId,
    Position, TableAction, TableBoard,
};
use blueprint_core::{CabinetId, LayerId, ProjectId, RowId, TableId};
use blueprint_store::Store;
use chrono::Utc;
use clap::Subcommand;

use crate::Context;

#[derive(Subcommand, Debug)]
pub enum BoardCommand {
    /// Print a project's whiteboard.
    Show {
        /// Project to show.
        project_id: ProjectId,

        /// Print the stored layout as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Add a layer connected to the home node.
    AddLayer {
        /// Owning project.
        project_id: ProjectId,

        /// Layer label.
        label: String,

        /// Layer type (frontend, backend, database, infrastructure, integration, custom).
        #[arg(long = "type", default_value = "custom")]
        layer_type: LayerType,

        /// Horizontal position.
        #[arg(long, default_value_t = 400.0)]
        x: f64,

        /// Vertical position.
        #[arg(long, default_value_t = 300.0)]
        y: f64,
    },

    /// Add a cabinet to a layer.
    AddCabinet {
        /// Owning project.
        project_id: ProjectId,

        /// Owning layer.
        layer_id: LayerId,

        /// Cabinet name.
        name: String,

        /// Optional description.
        #[arg(long)]
        description: Option<String>,
    },

    /// Add a table diagram to a cabinet.
    AddTable {
        /// Owning project.
        project_id: ProjectId,

        /// Owning cabinet.
        cabinet_id: CabinetId,

        /// Table label.
        #[arg(long)]
        label: Option<String>,
    },

    /// Append a column row to a table.
    AddRow {
        /// Owning project.
        project_id: ProjectId,

        /// Owning table.
        table_id: TableId,

        /// Column name.
        title: String,

        /// Column type.
        #[arg(long = "type")]
        column_type: Option<String>,
    },

    /// Connect two rows, exposing their handles if needed.
    Connect {
        /// Owning project.
        project_id: ProjectId,

        /// Source row as `TABLE_ID:ROW_ID`.
        #[arg(long)]
        from: RowRef,

        /// Target row as `TABLE_ID:ROW_ID`.
        #[arg(long)]
        to: RowRef,
    },
}

/// A row addressed by its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRef {
    table_id: TableId,
    row_id: RowId,
}

impl FromStr for RowRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (table, row) = s
            .split_once(':')
            .ok_or_else(|| format!("expected TABLE_ID:ROW_ID, got {s}"))?;
        Ok(Self {
            table_id: table.parse().map_err(|e| format!("bad table ID: {e}"))?,
            row_id: row.parse().map_err(|e| format!("bad row ID: {e}"))?,
        })
    }
}

pub fn run(ctx: &Context, command: BoardCommand) -> anyhow::Result<()> {
    match command {
        BoardCommand::Show { project_id, json } => {
            let blueprint = load(ctx, &project_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&blueprint)?);
            } else {
                print_blueprint(&blueprint);
            }
        }
        BoardCommand::AddLayer {
            project_id,
            label,
            layer_type,
            x,
            y,
        } => {
            let layer_id = LayerId::generate();
            update(
                ctx,
                &project_id,
                vec![LayerAction::CreateLayer {
                    layer_id,
                    label,
                    layer_type,
                    position: Position::new(x, y),
                    color: None,
                    border_color: None,
                }
                .into()],
            )?;
            println!("{layer_id}");
        }
        BoardCommand::AddCabinet {
            project_id,
            layer_id,
            name,
            description,
        } => {
            let cabinet_id = CabinetId::generate();
            update(
                ctx,
                &project_id,
                vec![LayerAction::AddCabinet {
                    layer_id,
                    cabinet_id,
                    name,
                    description,
                }
                .into()],
            )?;
            println!("{cabinet_id}");
        }
        BoardCommand::AddTable {
            project_id,
            cabinet_id,
            label,
        } => {
            let table_id = TableId::generate();
            let mut actions: Vec<BlueprintAction> = vec![TableAction::CreateTable {
                table_id,
                default_rows: [RowId::generate(), RowId::generate()],
                cabinet_id,
                position: None,
            }
            .into()];
            if let Some(label) = label {
                actions.push(TableAction::RenameTable { table_id, label }.into());
            }
            update(ctx, &project_id, actions)?;
            println!("{table_id}");
        }
        BoardCommand::AddRow {
            project_id,
            table_id,
            title,
            column_type,
        } => {
            let row_id = RowId::generate();
            update(
                ctx,
                &project_id,
                vec![TableAction::CreateRow {
                    table_id,
                    row_id,
                    title,
                    column_type,
                }
                .into()],
            )?;
            println!("{row_id}");
        }
        BoardCommand::Connect {
            project_id,
            from,
            to,
        } => {
            let edge_id = format!("{}-{}", from.row_id, to.row_id);
            update(ctx, &project_id, connect_actions(&edge_id, from, to))?;
            println!("{edge_id}");
        }
    }
    Ok(())
}

/// Actions that expose both handles and add the edge.
fn connect_actions(edge_id: &str, from: RowRef, to: RowRef) -> Vec<BlueprintAction> {
    vec![
        TableAction::AddRowHandle {
            table_id: from.table_id,
            row_id: from.row_id,
            side: HandleSide::Right,
        }
        .into(),
        TableAction::AddRowHandle {
            table_id: to.table_id,
            row_id: to.row_id,
            side: HandleSide::Left,
        }
        .into(),
        TableAction::Connect(Edge::row_connection(
            edge_id,
            (from.table_id, from.row_id),
            (to.table_id, to.row_id),
        ))
        .into(),
    ]
}

fn load(ctx: &Context, project_id: &ProjectId) -> anyhow::Result<Blueprint> {
    let project = ctx.project(project_id)?;
    Ok(ctx
        .store
        .get_blueprint(project_id)?
        .unwrap_or_else(|| Blueprint::new(*project_id, Some(project.name))))
}

/// Apply actions in order and save. Nothing is saved if any action fails.
fn update(
    ctx: &Context,
    project_id: &ProjectId,
    actions: Vec<BlueprintAction>,
) -> anyhow::Result<()> {
    let mut blueprint = load(ctx, project_id)?;
    let now = Utc::now();
    for action in actions {
        blueprint
            .apply(action, now)
            .context("whiteboard update rejected")?;
    }
    ctx.store.put_blueprint(&blueprint)?;
    tracing::debug!(project_id = %project_id, "Saved whiteboard");
    Ok(())
}

fn print_blueprint(blueprint: &Blueprint) {
    let layers = blueprint.layers();
    let tables = blueprint.tables();

    println!("{} ({})", layers.project_name(), blueprint.project_id());
    for layer in layers.layers() {
        let hidden = if layer.is_visible { "" } else { "  (hidden)" };
        println!(
            "  layer {}  {} [{}]{hidden}",
            layer.layer_id,
            layer.label,
            layer.layer_type.as_str()
        );
        for cabinet in &layer.cabinets {
            println!("    cabinet {}  {}", cabinet.cabinet_id, cabinet.name);
            for table in tables.cabinet_tables(&cabinet.cabinet_id) {
                println!("      table {}  {}", table.table_id, table.label);
                for row in &table.rows {
                    println!(
                        "        row {}  {}: {}",
                        row.row_id, row.title, row.column_type
                    );
                }
            }
        }
    }

    let connections: Vec<&Edge> = tables
        .edges()
        .iter()
        .filter(|e| e.kind == EdgeKind::RowConnection)
        .collect();
    if !connections.is_empty() {
        println!("  connections:");
        for edge in connections {
            println!(
                "    {} -> {}",
                endpoint(tables, edge.source, edge.source_handle.map(|h| h.row)),
                endpoint(tables, edge.target, edge.target_handle.map(|h| h.row)),
            );
        }
    }
}

/// `table.row` label of an edge endpoint.
fn endpoint(tables: &TableBoard, node: NodeId, row: Option<RowId>) -> String {
    let NodeId::Table(table_id) = node else {
        return node.to_string();
    };
    let Some(table) = tables.table(&table_id) else {
        return table_id.to_string();
    };
    match row.and_then(|r| table.row(&r)) {
        Some(row) => format!("{}.{}", table.label, row.title),
        None => table.label.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_row_ref() {
        let table_id = TableId::generate();
        let row_id = RowId::generate();

        let parsed: RowRef = format!("{table_id}:{row_id}").parse().unwrap();
        assert_eq!(parsed, RowRef { table_id, row_id });

        assert!("missing-colon".parse::<RowRef>().is_err());
        assert!(format!("{table_id}:nope").parse::<RowRef>().is_err());
    }

    #[test]
    fn connect_actions_link_two_new_rows() {
        let project_id = ProjectId::generate();
        let mut blueprint = Blueprint::new(project_id, Some("Shop".to_string()));
        let now = Utc::now();

        let layer_id = LayerId::generate();
        let cabinet_id = CabinetId::generate();
        let users = TableId::generate();
        let orders = TableId::generate();
        let actions: Vec<BlueprintAction> = vec![
            LayerAction::CreateLayer {
                layer_id,
                label: "Data".to_string(),
                layer_type: LayerType::Database,
                position: Position::new(0.0, 0.0),
                color: None,
                border_color: None,
            }
            .into(),
            LayerAction::AddCabinet {
                layer_id,
                cabinet_id,
                name: "Main".to_string(),
                description: None,
            }
            .into(),
            TableAction::CreateTable {
                table_id: users,
                default_rows: [RowId::generate(), RowId::generate()],
                cabinet_id,
                position: None,
            }
            .into(),
            TableAction::CreateTable {
                table_id: orders,
                default_rows: [RowId::generate(), RowId::generate()],
                cabinet_id,
                position: None,
            }
            .into(),
        ];
        for action in actions {
            blueprint.apply(action, now).unwrap();
        }

        let from = RowRef {
            table_id: users,
            row_id: blueprint.tables().table(&users).unwrap().rows[0].row_id,
        };
        let to = RowRef {
            table_id: orders,
            row_id: blueprint.tables().table(&orders).unwrap().rows[0].row_id,
        };
        for action in connect_actions("e1", from, to) {
            blueprint.apply(action, now).unwrap();
        }

        let edges = blueprint.tables().edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].id, "e1");
        assert_eq!(
            endpoint(blueprint.tables(), edges[0].source, Some(from.row_id)),
            "New Table.id"
        );
    }
}
