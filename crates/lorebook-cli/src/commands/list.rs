use std::path::Path;

use anyhow::Result;
use clap::Args;
use lorebook_core::{ContextType, ListFilter, ParentFilter};

use super::open_store;
use crate::output::format::format_summary_list;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct ListArgs {
    /// Only contexts of this type (label or name)
    #[arg(long = "type")]
    pub context_type: Option<ContextType>,

    /// Project to list (default: the current project)
    #[arg(long)]
    pub project: Option<String>,

    /// Only direct children of this context
    #[arg(long, conflicts_with = "roots")]
    pub parent: Option<String>,

    /// Only contexts without a parent
    #[arg(long)]
    pub roots: bool,
}

pub fn run(args: &ListArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let store = open_store(dir)?;
    let parent = match (&args.parent, args.roots) {
        (Some(id), _) => ParentFilter::Child(id.clone()),
        (None, true) => ParentFilter::Root,
        (None, false) => ParentFilter::Any,
    };
    let rows = store.list(&ListFilter {
        project_id: args.project.clone(),
        context_type: args.context_type,
        parent,
    });
    println!("{}", format_summary_list(&rows, format).trim_end());
    Ok(())
}
