use std::path::Path;

use anyhow::Result;
use clap::Args;
use lorebook_core::StoreError;

use super::{finish, open_store};
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct DeleteArgs {
    /// Context ID
    pub id: String,
}

pub fn run(args: &DeleteArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let mut store = open_store(dir)?;
    let orphans = store
        .get(&args.id)
        .map(|n| n.children.len())
        .ok_or_else(|| StoreError::not_found(&args.id))?;
    store.delete(&args.id);
    finish(&mut store)?;

    let mut message = format!("Deleted context {}", args.id);
    if orphans > 0 {
        message.push_str(&format!(" ({orphans} child context(s) kept as roots)"));
    }
    print_done(format, &message, serde_json::json!({"id": args.id}));
    Ok(())
}
