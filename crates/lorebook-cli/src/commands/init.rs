use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use lorebook_core::{ContextStore, StoreConfig};

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing config with defaults
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs, dir: &Path) -> Result<()> {
    if StoreConfig::exists(dir) && !args.force {
        println!("Lorebook is already initialized in {}.", dir.display());
        println!("Use --force to reset the config to defaults.");
        return Ok(());
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    StoreConfig::default()
        .save(dir)
        .context("Failed to write config")?;
    let store = ContextStore::open(dir).context("Failed to initialize context store")?;

    println!(
        "Lorebook initialized in {} ({} existing contexts).",
        dir.display(),
        store.len()
    );
    println!();
    println!("Next steps:");
    println!("  lorebook create <name> --type 人物设定 --content <text>   Add a context");
    println!("  lorebook select <id>...                                 Choose what the model sees");
    println!("  lorebook ask <question>                                 Ask with the selected context");
    Ok(())
}
