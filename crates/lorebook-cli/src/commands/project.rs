use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

use super::open_store;
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommand,
}

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// Create a project and make it current
    Create {
        /// Project ID (used as the project tag on contexts)
        id: String,
        /// Display name (default: the ID)
        #[arg(long)]
        name: Option<String>,
    },
    /// List projects
    List,
}

pub fn run(args: &ProjectArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let mut store = open_store(dir)?;
    match &args.command {
        ProjectCommand::Create { id, name } => {
            let name = name.as_deref().unwrap_or(id);
            store.create_project(id, name)?;
            print_done(
                format,
                &format!("Created project {id} and made it current"),
                serde_json::json!({"id": id, "name": name}),
            );
        }
        ProjectCommand::List => {
            let projects = store.projects()?;
            match format {
                OutputFormat::Json => {
                    let value = serde_json::json!({
                        "current": store.current_project(),
                        "projects": projects,
                    });
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
                OutputFormat::Text => {
                    if projects.is_empty() {
                        println!("No projects (current: {}).", store.current_project());
                    }
                    for p in &projects {
                        let current = if p.id == store.current_project() { "*" } else { " " };
                        println!(
                            "{current} {} {}  ({})",
                            p.id,
                            p.name,
                            p.created_at.format("%Y-%m-%d")
                        );
                    }
                }
            }
        }
    }
    Ok(())
}
