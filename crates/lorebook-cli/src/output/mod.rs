pub mod format;

use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Report a completed mutation: the message as text, or a status envelope as JSON.
pub fn print_done(format: OutputFormat, message: &str, data: Value) {
    match format {
        OutputFormat::Text => println!("{message}"),
        OutputFormat::Json => {
            let body = json!({"status": "success", "message": message, "data": data});
            println!(
                "{}",
                serde_json::to_string_pretty(&body).unwrap_or_default()
            );
        }
    }
}
