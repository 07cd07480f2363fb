pub mod ask;
pub mod create;
pub mod delete;
pub mod deselect;
pub mod history;
pub mod init;
pub mod item;
pub mod list;
pub mod move_node;
pub mod novel;
pub mod path;
pub mod project;
pub mod save;
pub mod save_type;
pub mod select;
pub mod selected;
pub mod serve;
pub mod show;
pub mod stats;
pub mod tree;
pub mod types;
pub mod update;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use lorebook_core::{ContextStore, Metadata, StoreConfig, StoreError};

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config into the data directory
    Init(init::InitArgs),
    /// List the context types
    Types,
    /// Show counts per type and selection size
    Stats,
    /// List contexts of a project
    List(list::ListArgs),
    /// Show one context with its entries
    Show(show::ShowArgs),
    /// Create a context
    Create(create::CreateArgs),
    /// Update a context's content, name or metadata
    Update(update::UpdateArgs),
    /// Delete a context (children are kept)
    Delete(delete::DeleteArgs),
    /// Move a context under another one, or to the root
    #[command(name = "move")]
    Move(move_node::MoveArgs),
    /// Show the path from the root to a context
    Path(path::PathArgs),
    /// Show the context tree
    Tree(tree::TreeArgs),
    /// Manage the entries of a context
    Item(item::ItemArgs),
    /// Replace the selected contexts
    Select(select::SelectArgs),
    /// Remove contexts from the selection
    Deselect(deselect::DeselectArgs),
    /// Print the assembled text of the selected contexts
    Selected,
    /// Save text into a context
    Save(save::SaveArgs),
    /// Append text to the first context of a type
    SaveType(save_type::SaveTypeArgs),
    /// Append a question and answer to the conversation history
    History(history::HistoryArgs),
    /// Import scraped novel metadata
    Novel(novel::NovelArgs),
    /// Manage projects
    Project(project::ProjectArgs),
    /// Ask the configured model a question using the selected context
    Ask(ask::AskArgs),
    /// Run the MCP server on stdio
    Serve,
}

/// Open the store with env overrides applied to its config.
pub fn open_store(dir: &Path) -> Result<ContextStore> {
    let config = StoreConfig::load(dir)
        .context("Failed to load config")?
        .apply_env();
    ContextStore::open_with_config(dir, config)
        .with_context(|| format!("Failed to open context store at {}", dir.display()))
}

/// Retry failed writes; the process is about to exit, so anything unsaved is an error.
pub fn finish(store: &mut ContextStore) -> Result<()> {
    store
        .flush()
        .context("Changes could not be written to the data directory")
}

/// Parse repeated `key=value` options. Values that parse as JSON keep their type.
pub fn parse_metadata(pairs: &[String]) -> Result<Option<Metadata>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut metadata = Metadata::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            StoreError::Validation(format!("metadata must be key=value, got '{pair}'"))
        })?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        metadata.insert(key.trim().to_string(), value);
    }
    Ok(Some(metadata))
}

/// Use `text` as given, or read stdin when it is `-`.
pub fn text_arg(text: &str) -> Result<String> {
    if text != "-" {
        return Ok(text.to_string());
    }
    let mut buf = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)
        .context("Failed to read stdin")?;
    Ok(buf.trim_end_matches('\n').to_string())
}
