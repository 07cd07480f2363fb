use std::path::Path;

use anyhow::Result;
use clap::Args;
use lorebook_core::StoreError;

use super::open_store;
use crate::output::format::format_path;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct PathArgs {
    /// Context ID
    pub id: String,
}

pub fn run(args: &PathArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let store = open_store(dir)?;
    let path = store.path(&args.id);
    if path.is_empty() {
        return Err(StoreError::not_found(&args.id).into());
    }
    println!("{}", format_path(&path, format).trim_end());
    Ok(())
}
