use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;
use lorebook_core::{ContentInput, StoreError};

use super::{finish, open_store, parse_metadata, text_arg};
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct UpdateArgs {
    /// Context ID
    pub id: String,

    /// New text for the first entry (`-` reads stdin)
    #[arg(long)]
    pub content: Option<String>,

    /// New display name
    #[arg(long)]
    pub name: Option<String>,

    /// Metadata merged as key=value (repeatable)
    #[arg(long = "meta")]
    pub metadata: Vec<String>,
}

pub fn run(args: &UpdateArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    if args.content.is_none() && args.name.is_none() && args.metadata.is_empty() {
        bail!("Nothing to update: pass --content, --name or --meta");
    }
    let metadata = parse_metadata(&args.metadata)?;

    let mut store = open_store(dir)?;
    if !store.contains(&args.id) {
        return Err(StoreError::not_found(&args.id).into());
    }

    if let Some(name) = &args.name {
        store.rename(&args.id, name)?;
    }
    match &args.content {
        Some(text) => {
            let text = text_arg(text)?;
            store.update(&args.id, ContentInput::Text(text), metadata)?;
        }
        None if metadata.is_some() => {
            let entries = store.items(&args.id)?.to_vec();
            store.update(&args.id, ContentInput::Entries(entries), metadata)?;
        }
        None => {}
    }
    finish(&mut store)?;

    print_done(
        format,
        &format!("Updated context {}", args.id),
        serde_json::json!({"id": args.id}),
    );
    Ok(())
}
