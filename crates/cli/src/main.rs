//! hitgate CLI - rate-limit a command behind a debounce gate

use clap::{ArgAction, Parser, Subcommand};
use anyhow::Result;
use std::path::PathBuf;
use tracing::Level;

mod cmd;
mod settings;

/// hitgate - run a command at most as often as its triggers allow
#[derive(Parser)]
#[command(name = "hitgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read hits from stdin (one per line) and run a command through the gate
    Run(cmd::run::RunArgs),
    /// View or edit the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Config file to read
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a single value
    Get {
        /// Dotted key, e.g. gate.delay_ms
        key: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Change a single value
    Set {
        /// Dotted key, e.g. gate.delay_ms
        key: String,
        value: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the default config file path
    Path {
        /// Create the file with example contents if missing
        #[arg(long)]
        create: bool,
    },
    /// Print an example configuration
    Example,
    /// Check a configuration file
    Validate {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (stdout is reserved for command output)
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => cmd::run::run(args).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show { config, json } => {
                cmd::config::run_show(config.as_deref(), json).await
            }
            ConfigCommands::Get { key, config } => {
                cmd::config::run_get(config.as_deref(), &key).await
            }
            ConfigCommands::Set { key, value, config } => {
                cmd::config::run_set(config.as_deref(), &key, &value).await
            }
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
            ConfigCommands::Validate { config } => {
                cmd::config::run_validate(config.as_deref()).await
            }
        },
    }
}
