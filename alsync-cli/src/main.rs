use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{init, log, push, status, stop, watch};

#[derive(Parser)]
#[command(name = "alsync")]
#[command(version, about = "Automatic git history for Ableton Live projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a settings file interactively
    Init {
        /// Settings file (defaults to ./settings.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Watch the project, commit every save and push on a schedule
    Watch {
        /// Settings file (defaults to ./settings.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port for the control API
        #[arg(short, long, default_value_t = commands::DEFAULT_PORT)]
        port: u16,
    },

    /// Push all branches now
    Push {
        #[arg(short, long, default_value_t = commands::DEFAULT_PORT)]
        port: u16,
    },

    /// Stop the running watch session
    Stop {
        #[arg(short, long, default_value_t = commands::DEFAULT_PORT)]
        port: u16,
    },

    /// Show the running session's status
    Status {
        #[arg(short, long, default_value_t = commands::DEFAULT_PORT)]
        port: u16,
    },

    /// Show recent session activity
    Log {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        #[arg(short, long, default_value_t = commands::DEFAULT_PORT)]
        port: u16,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { config } => {
            init::run(config)?;
        }
        Commands::Watch { config, port } => {
            watch::run(config, port)?;
        }
        Commands::Push { port } => {
            push::run(port)?;
        }
        Commands::Stop { port } => {
            stop::run(port)?;
        }
        Commands::Status { port } => {
            status::run(port)?;
        }
        Commands::Log { limit, port } => {
            log::run(limit, port)?;
        }
    }

    Ok(())
}
