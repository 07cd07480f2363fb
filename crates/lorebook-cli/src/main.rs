use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "lorebook",
    version,
    about = "Curate, organise and select the background material of a novel"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    /// Data directory holding the context store
    #[arg(long, global = true, env = "LOREBOOK_DIR", default_value = "context_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let dir = cli.data_dir.as_path();
    let format = cli.format;

    use commands::Commands;
    match &cli.command {
        Commands::Init(args) => commands::init::run(args, dir),
        Commands::Types => commands::types::run(format),
        Commands::Stats => commands::stats::run(dir, format),
        Commands::List(args) => commands::list::run(args, dir, format),
        Commands::Show(args) => commands::show::run(args, dir, format),
        Commands::Create(args) => commands::create::run(args, dir, format),
        Commands::Update(args) => commands::update::run(args, dir, format),
        Commands::Delete(args) => commands::delete::run(args, dir, format),
        Commands::Move(args) => commands::move_node::run(args, dir, format),
        Commands::Path(args) => commands::path::run(args, dir, format),
        Commands::Tree(args) => commands::tree::run(args, dir, format),
        Commands::Item(args) => commands::item::run(args, dir, format),
        Commands::Select(args) => commands::select::run(args, dir, format),
        Commands::Deselect(args) => commands::deselect::run(args, dir, format),
        Commands::Selected => commands::selected::run(dir, format),
        Commands::Save(args) => commands::save::run(args, dir, format),
        Commands::SaveType(args) => commands::save_type::run(args, dir, format),
        Commands::History(args) => commands::history::run(args, dir, format),
        Commands::Novel(args) => commands::novel::run(args, dir, format),
        Commands::Project(args) => commands::project::run(args, dir, format),
        Commands::Ask(args) => commands::ask::run(args, dir, format),
        Commands::Serve => commands::serve::run(dir),
    }
}
