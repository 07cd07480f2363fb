use std::path::Path;

use anyhow::Result;
use clap::Args;
use lorebook_core::ContextType;

use super::{finish, open_store, text_arg};
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct SaveTypeArgs {
    /// Context type (label or name)
    #[arg(long = "type")]
    pub context_type: ContextType,

    /// Text to append (`-` reads stdin)
    pub content: String,
}

pub fn run(args: &SaveTypeArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let text = text_arg(&args.content)?;
    let mut store = open_store(dir)?;
    let id = store.save_to_type(args.context_type, &text);
    finish(&mut store)?;

    let name = store.get(&id).map(|n| n.name.as_str()).unwrap_or_default();
    print_done(
        format,
        &format!("Saved to {name} ({id})"),
        serde_json::json!({"id": id}),
    );
    Ok(())
}
