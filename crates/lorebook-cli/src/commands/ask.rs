use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use lorebook_core::llm::{CommandModel, LanguageModel};
use lorebook_core::prompt::PromptRequest;

use super::{finish, open_store};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct AskArgs {
    /// The question
    pub question: String,

    /// Model command (overrides the configured `llm_command`)
    #[arg(long)]
    pub model_command: Option<String>,

    /// Name of a tool whose output follows the question
    #[arg(long, requires = "tool_result")]
    pub tool_name: Option<String>,

    /// That tool's output
    #[arg(long, requires = "tool_name")]
    pub tool_result: Option<String>,

    /// Print the answer line by line as it arrives
    #[arg(long)]
    pub stream: bool,

    /// Do not append the exchange to the conversation history
    #[arg(long)]
    pub no_history: bool,

    /// Print the prompt instead of calling the model
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: &AskArgs, dir: &Path, format: OutputFormat) -> Result<()> {
    let mut store = open_store(dir)?;

    let mut request = PromptRequest::build(&store.selected_content(), &args.question);
    if let (Some(name), Some(result)) = (&args.tool_name, &args.tool_result) {
        request = request.with_tool_result(name, result);
    }

    if args.dry_run {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&request)?),
            OutputFormat::Text => println!("{}", request.render()),
        }
        return Ok(());
    }

    let command = args
        .model_command
        .clone()
        .or_else(|| store.config().llm_command.clone())
        .context("No model configured: set llm_command in config.json, LOREBOOK_LLM_COMMAND, or --model-command")?;
    let model = CommandModel::new(command);
    let failed = || format!("Model command `{}` failed", model.command());

    let answer = if args.stream && matches!(format, OutputFormat::Text) {
        let mut lines = Vec::new();
        let mut stdout = std::io::stdout();
        for fragment in model.stream(&request).with_context(failed)? {
            let fragment = fragment.with_context(failed)?;
            writeln!(stdout, "{fragment}")?;
            stdout.flush()?;
            lines.push(fragment);
        }
        lines.join("\n")
    } else {
        let answer = model.complete(&request).with_context(failed)?;
        if matches!(format, OutputFormat::Text) {
            println!("{answer}");
        }
        answer
    };

    let history_id = if store.config().history_enabled && !args.no_history {
        let id = store.save_to_history(&args.question, &answer, None);
        finish(&mut store)?;
        Some(id)
    } else {
        None
    };

    if matches!(format, OutputFormat::Json) {
        let value = serde_json::json!({
            "question": args.question,
            "answer": answer,
            "history_id": history_id,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
