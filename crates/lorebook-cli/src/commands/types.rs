use anyhow::Result;
use lorebook_core::ContextType;

use crate::output::OutputFormat;

pub fn run(format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let types: Vec<_> = ContextType::ALL
                .iter()
                .map(|t| serde_json::json!({"name": t.name(), "label": t.label()}))
                .collect();
            println!("{}", serde_json::to_string_pretty(&types)?);
        }
        OutputFormat::Text => {
            for t in ContextType::ALL {
                println!("{:<10} {}", t.name(), t.label());
            }
        }
    }
    Ok(())
}
