use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::{finish, open_store};
use crate::output::{print_done, OutputFormat};

#[derive(Args)]
pub struct HistoryArgs {
    /// The question asked
    pub question: String,

    /// The answer given
    pub answer: String,

    /// Project (default: the current project)
    #[arg(long)]
    pub project: Option<String>,
}

pub fn run(args: &HistoryArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let mut store = open_store(dir)?;
    let id = store.save_to_history(&args.question, &args.answer, args.project.as_deref());
    finish(&mut store)?;
    print_done(
        format,
        &format!("Saved to history {id}"),
        serde_json::json!({"id": id}),
    );
    Ok(())
}
