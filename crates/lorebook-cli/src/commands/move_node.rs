use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use super::{finish, open_store};
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct MoveArgs {
    /// Context to move
    pub id: String,

    /// New parent (omit to move to the root)
    pub parent: Option<String>,
}

pub fn run(args: &MoveArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let mut store = open_store(dir)?;
    store
        .try_move(&args.id, args.parent.as_deref())
        .context("Move rejected")?;
    finish(&mut store)?;

    let target = args.parent.as_deref().unwrap_or("the root");
    print_done(
        format,
        &format!("Moved {} under {target}", args.id),
        serde_json::json!({"id": args.id, "parent_id": args.parent}),
    );
    Ok(())
}
