//! CardKit CLI
//!
//! Offline harness for the card form engine.
//!
//! # Usage
//!
//! ```bash
//! cardkit replay --file scenario.json
//! cardkit check --file submission.json --format yaml
//! cardkit config init
//! cardkit --profile staging config show
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

#[derive(Parser)]
#[command(name = "cardkit")]
#[command(author = "CardKit")]
#[command(version)]
#[command(about = "Replay card callbacks and check form submissions", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(long, env = "CARDKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Profile name; selects config.<profile>.toml
    #[arg(long, short)]
    profile: Option<String>,

    /// Output format (defaults to the config file's default_format, then json)
    #[arg(long, short)]
    format: Option<output::OutputFormat>,

    /// Debug logging unless RUST_LOG is set
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register cards and feed recorded callbacks through the engine
    Replay {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Validate a submitted field list
    Check {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = config::Config::resolve_path(cli.config.as_deref(), cli.profile.as_deref())?;
    let config = config::Config::load(&path)?;
    let format = cli
        .format
        .or_else(|| config.output_format())
        .unwrap_or(output::OutputFormat::Json);

    match cli.command {
        Commands::Replay { file } => commands::replay::handle(&file, config.engine, format).await,
        Commands::Check { file } => commands::check::handle(&file, config.engine, format).await,
        Commands::Config { action } => commands::config::handle(action, &path, config, format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::debug!("cardkit v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
