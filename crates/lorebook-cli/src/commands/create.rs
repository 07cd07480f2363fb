use std::path::Path;

use anyhow::Result;
use clap::Args;
use lorebook_core::{ContextType, NewContext};

use super::{finish, open_store, parse_metadata, text_arg};
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct CreateArgs {
    /// Display name
    pub name: String,

    /// Context type (label such as 人物设定, or name such as CHARACTER)
    #[arg(long = "type")]
    pub context_type: ContextType,

    /// Initial text (`-` reads stdin)
    #[arg(long, default_value = "")]
    pub content: String,

    /// Parent context ID
    #[arg(long)]
    pub parent: Option<String>,

    /// Project (default: the current project)
    #[arg(long)]
    pub project: Option<String>,

    /// Metadata as key=value (repeatable)
    #[arg(long = "meta")]
    pub metadata: Vec<String>,
}

pub fn run(args: &CreateArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let metadata = parse_metadata(&args.metadata)?;
    let content = text_arg(&args.content)?;

    let mut store = open_store(dir)?;
    if let Some(parent) = &args.parent {
        if !store.contains(parent) {
            tracing::warn!("Parent {parent} does not exist; keeping the reference anyway");
        }
    }

    let id = store.create(NewContext {
        name: args.name.clone(),
        context_type: args.context_type,
        content: content.into(),
        project_id: args.project.clone(),
        metadata,
        parent_id: args.parent.clone(),
    });
    finish(&mut store)?;

    print_done(
        format,
        &format!("Created context {id}"),
        serde_json::json!({"id": id}),
    );
    Ok(())
}
