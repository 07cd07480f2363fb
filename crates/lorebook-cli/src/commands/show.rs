use std::path::Path;

use anyhow::Result;
use clap::Args;
use lorebook_core::StoreError;

use super::open_store;
use crate::output::format::format_node;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct ShowArgs {
    /// Context ID
    pub id: String,
}

pub fn run(args: &ShowArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let store = open_store(dir)?;
    let node = store
        .get(&args.id)
        .ok_or_else(|| StoreError::not_found(&args.id))?;
    println!(
        "{}",
        format_node(node, store.is_selected(&args.id), format).trim_end()
    );
    Ok(())
}
