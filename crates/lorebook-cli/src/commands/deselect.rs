use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;

use super::{finish, open_store};
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct DeselectArgs {
    /// Context IDs to remove from the selection
    pub ids: Vec<String>,

    /// Clear the whole selection
    #[arg(long, conflicts_with = "ids")]
    pub all: bool,
}

pub fn run(args: &DeselectArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    if args.ids.is_empty() && !args.all {
        bail!("Pass context IDs or --all");
    }
    let mut store = open_store(dir)?;
    if args.all {
        store.clear_selection();
    } else {
        store.deselect(&args.ids);
    }
    finish(&mut store)?;

    let selected = store.selected_ids().to_vec();
    print_done(
        format,
        &format!("{} context(s) still selected", selected.len()),
        serde_json::json!({"selected": selected}),
    );
    Ok(())
}
