use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::{finish, open_store};
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct SelectArgs {
    /// Context IDs, in assembly order. Replaces the current selection.
    #[arg(required = true)]
    pub ids: Vec<String>,
}

pub fn run(args: &SelectArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let mut store = open_store(dir)?;
    store.select(&args.ids);
    finish(&mut store)?;

    let selected = store.selected_ids().to_vec();
    let dropped = args.ids.iter().filter(|id| !store.contains(id)).count();
    let mut message = format!("{} context(s) selected", selected.len());
    if dropped > 0 {
        message.push_str(&format!(" ({dropped} unknown ID(s) ignored)"));
    }
    print_done(format, &message, serde_json::json!({"selected": selected}));
    Ok(())
}
