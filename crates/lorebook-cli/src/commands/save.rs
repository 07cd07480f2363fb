use std::path::Path;

use anyhow::Result;
use clap::Args;
use lorebook_core::SaveMode;

use super::{finish, open_store, parse_metadata, text_arg};
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct SaveArgs {
    /// Context ID
    pub id: String,

    /// Text to save (`-` reads stdin)
    pub content: String,

    /// Append to the first entry instead of replacing it
    #[arg(long)]
    pub append: bool,

    /// Add as a new entry (wins over --append)
    #[arg(long)]
    pub new_item: bool,

    /// Metadata merged as key=value (repeatable)
    #[arg(long = "meta")]
    pub metadata: Vec<String>,
}

pub fn run(args: &SaveArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let metadata = parse_metadata(&args.metadata)?;
    let text = text_arg(&args.content)?;
    let mode = SaveMode::from_flags(args.append, args.new_item);

    let mut store = open_store(dir)?;
    let item_id = store.save_to_context(&args.id, &text, mode, metadata)?;
    finish(&mut store)?;

    let message = match &item_id {
        Some(item) => format!("Saved to {} as {item}", args.id),
        None => format!("Saved to {}", args.id),
    };
    print_done(
        format,
        &message,
        serde_json::json!({"id": args.id, "item_id": item_id}),
    );
    Ok(())
}
