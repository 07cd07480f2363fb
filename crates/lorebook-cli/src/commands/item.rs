use std::path::Path;

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use lorebook_core::StoreError;

use super::{finish, open_store, text_arg};
use crate::output::format::{format_entry, format_items};
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct ItemArgs {
    #[command(subcommand)]
    pub command: ItemCommand,
}

#[derive(Subcommand)]
pub enum ItemCommand {
    /// List the entries of a context (● marks selected entries)
    List {
        /// Context ID
        context_id: String,
    },
    /// Print one entry
    Show { context_id: String, item_id: String },
    /// Append an entry
    Add {
        context_id: String,
        /// Entry text (`-` reads stdin)
        content: String,
        /// Entry ID (default: item_<n>)
        #[arg(long = "id")]
        item_id: Option<String>,
    },
    /// Replace the text of an entry
    Update {
        context_id: String,
        item_id: String,
        /// New text (`-` reads stdin)
        content: String,
    },
    /// Delete an entry
    Delete { context_id: String, item_id: String },
    /// Select entries; once any are selected only those are assembled
    Select {
        context_id: String,
        #[arg(required = true)]
        item_ids: Vec<String>,
    },
    /// Deselect entries
    Deselect {
        context_id: String,
        #[arg(required = true)]
        item_ids: Vec<String>,
    },
    /// Clear the entry selection so every entry is assembled
    Clear { context_id: String },
}

pub fn run(args: &ItemArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let mut store = open_store(dir)?;

    match &args.command {
        ItemCommand::List { context_id } => {
            let node = store
                .get(context_id)
                .ok_or_else(|| StoreError::not_found(context_id))?;
            println!("{}", format_items(node, format).trim_end());
            return Ok(());
        }
        ItemCommand::Show {
            context_id,
            item_id,
        } => {
            let entry = store.get_item(context_id, item_id)?;
            println!("{}", format_entry(entry, format).trim_end());
            return Ok(());
        }
        ItemCommand::Add {
            context_id,
            content,
            item_id,
        } => {
            let text = text_arg(content)?;
            let id = store.add_item(context_id, &text, item_id.as_deref())?;
            finish(&mut store)?;
            print_done(
                format,
                &format!("Added item {id} to {context_id}"),
                serde_json::json!({"context_id": context_id, "item_id": id}),
            );
        }
        ItemCommand::Update {
            context_id,
            item_id,
            content,
        } => {
            let text = text_arg(content)?;
            if !store.update_item(context_id, item_id, &text)? {
                bail!(StoreError::ItemNotFound {
                    context_id: context_id.clone(),
                    item_id: item_id.clone(),
                });
            }
            finish(&mut store)?;
            print_done(
                format,
                &format!("Updated item {item_id}"),
                serde_json::json!({"context_id": context_id, "item_id": item_id}),
            );
        }
        ItemCommand::Delete {
            context_id,
            item_id,
        } => {
            if !store.delete_item(context_id, item_id)? {
                bail!(StoreError::ItemNotFound {
                    context_id: context_id.clone(),
                    item_id: item_id.clone(),
                });
            }
            finish(&mut store)?;
            print_done(
                format,
                &format!("Deleted item {item_id}"),
                serde_json::json!({"context_id": context_id, "item_id": item_id}),
            );
        }
        ItemCommand::Select {
            context_id,
            item_ids,
        } => {
            store.select_items(context_id, item_ids)?;
            report_selection(&mut store, context_id, format)?;
        }
        ItemCommand::Deselect {
            context_id,
            item_ids,
        } => {
            store.deselect_items(context_id, item_ids)?;
            report_selection(&mut store, context_id, format)?;
        }
        ItemCommand::Clear { context_id } => {
            store.clear_item_selection(context_id)?;
            report_selection(&mut store, context_id, format)?;
        }
    }
    Ok(())
}

fn report_selection(
    store: &mut lorebook_core::ContextStore,
    context_id: &str,
    format: OutputFormat,
) -> Result<()> {
    finish(store)?;
    let selected: Vec<String> = store
        .get(context_id)
        .map(|n| n.selected_items.iter().cloned().collect())
        .unwrap_or_default();
    let message = if selected.is_empty() {
        format!("No items selected in {context_id}; all items are used")
    } else {
        format!("Selected items in {context_id}: {}", selected.join(", "))
    };
    print_done(
        format,
        &message,
        serde_json::json!({"context_id": context_id, "selected_items": selected}),
    );
    Ok(())
}
