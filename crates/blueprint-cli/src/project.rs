//! `blueprint project` commands.

use blueprint_board::Blueprint;
use blueprint_core::ProjectId;
use blueprint_store::{Project, Store};
use clap::Subcommand;

use crate::Context;

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project in the team, with an empty whiteboard.
    Create {
        /// Project name.
        name: String,

        /// Optional description.
        #[arg(long)]
        description: Option<String>,
    },

    /// List the team's projects.
    List,

    /// Delete a project with its chats, messages and whiteboard.
    Remove {
        /// Project to delete.
        project_id: ProjectId,
    },
}

pub fn run(ctx: &Context, command: ProjectCommand) -> anyhow::Result<()> {
    match command {
        ProjectCommand::Create { name, description } => {
            let project = Project::new(ctx.team.clone(), ctx.user()?, name, description);
            ctx.store.create_project(&project)?;
            ctx.store.put_blueprint(&Blueprint::new(
                project.project_id,
                Some(project.name.clone()),
            ))?;
            tracing::debug!(project_id = %project.project_id, team_id = %project.team_id, "Created project");
            println!("{}", project.project_id);
        }
        ProjectCommand::List => {
            let projects = ctx.store.list_projects_by_team(&ctx.team)?;
            if projects.is_empty() {
                println!("No projects in team {}", ctx.team);
            }
            for project in projects {
                println!(
                    "{}  {}  {}",
                    project.project_id,
                    project.created_at.format("%Y-%m-%d %H:%M"),
                    project.name
                );
            }
        }
        ProjectCommand::Remove { project_id } => {
            let project = ctx.project(&project_id)?;
            ctx.store.delete_project(&project_id)?;
            println!("Removed {} ({})", project.name, project_id);
        }
    }
    Ok(())
}
