use std::path::Path;

use anyhow::Result;
use clap::Args;
use lorebook_core::StoreError;

use super::open_store;
use crate::output::format::format_tree;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct TreeArgs {
    /// Show only the subtree under this context
    #[arg(long)]
    pub root: Option<String>,
}

pub fn run(args: &TreeArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let store = open_store(dir)?;
    let roots = store.tree(args.root.as_deref());
    if let (Some(root), true) = (&args.root, roots.is_empty()) {
        return Err(StoreError::not_found(root).into());
    }
    println!("{}", format_tree(&roots, format).trim_end());
    Ok(())
}
