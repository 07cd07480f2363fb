use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use lorebook_core::novel::{is_supported_url, parse_scraper_output};

use super::{finish, open_store};
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct NovelArgs {
    #[command(subcommand)]
    pub command: NovelCommand,
}

#[derive(Subcommand)]
pub enum NovelCommand {
    /// Store the JSON output of the novel page scraper as a 小说数据 context
    Import {
        /// Scraper output file (`-` reads stdin)
        file: PathBuf,

        /// Context to overwrite (default: the project's first novel context)
        #[arg(long)]
        context: Option<String>,
    },
}

pub fn run(args: &NovelArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    match &args.command {
        NovelCommand::Import { file, context } => import(file, context.as_deref(), dir, format),
    }
}

fn import(file: &Path, context: Option<&str>, dir: &Path, format: OutputFormat) -> Result<()> {
    let raw = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?
    };

    let record = parse_scraper_output(&raw).context("Scraper output rejected")?;
    if !record.original_url.is_empty() && !is_supported_url(&record.original_url) {
        tracing::warn!("Importing a record from an unsupported page: {}", record.original_url);
    }

    let mut store = open_store(dir)?;
    let id = store.save_novel(&record, context)?;
    finish(&mut store)?;

    print_done(
        format,
        &format!("Saved novel '{}' to context {id}", record.title),
        serde_json::json!({"id": id, "title": record.title}),
    );
    Ok(())
}
