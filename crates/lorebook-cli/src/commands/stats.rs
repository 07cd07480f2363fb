use std::path::Path;

use anyhow::Result;

use super::open_store;
use crate::output::OutputFormat;

pub fn run(dir: &Path, format: OutputFormat) -> Result<()> {
    let store = open_store(dir)?;
    let stats = store.stats();

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "data_dir": store.data_dir(),
                "current_project": store.current_project(),
                "stats": stats,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!("Lorebook Statistics");
            println!("===================");
            println!("Data directory:  {}", store.data_dir().display());
            println!("Current project: {}", store.current_project());
            println!("Contexts:        {}", stats.total);
            println!("Selected:        {}", stats.selected);
            println!();
            println!("By Type:");
            for (context_type, count) in &stats.by_type {
                println!("  {}: {count}", context_type.label());
            }
        }
    }
    Ok(())
}
