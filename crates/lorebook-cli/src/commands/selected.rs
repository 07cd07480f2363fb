use std::path::Path;

use anyhow::Result;

use super::open_store;
use crate::output::OutputFormat;

pub fn run(dir: &Path, format: OutputFormat) -> Result<()> {
    let store = open_store(dir)?;
    let content = store.selected_content();
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "selected": store.selected_ids(),
                "content": content,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => println!("{content}"),
    }
    Ok(())
}
