//! Revisor CLI
//!
//! Command-line tools for Revisor history files.
//!
//! # Commands
//!
//! - `log` - List the revisions of a history file
//! - `show` - Print a document as of some revision
//! - `verify` - Check every record of a history file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Revisor history file tools.
#[derive(Parser)]
#[command(name = "revisor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the revisions of a history file
    Log {
        /// Path to the history file
        file: PathBuf,

        /// Show only the most recent revisions
        #[arg(short, long)]
        limit: Option<usize>,

        /// Show a single revision
        #[arg(short, long)]
        revision: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print a document as of some revision
    Show {
        /// Path to the history file
        file: PathBuf,

        /// Revision to materialize (default: head)
        #[arg(short, long)]
        revision: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check every record of a history file
    Verify {
        /// Path to the history file
        file: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Log {
            file,
            limit,
            revision,
            format,
        } => {
            commands::log::run(&file, limit, revision, &format)?;
        }
        Commands::Show {
            file,
            revision,
            format,
        } => {
            commands::show::run(&file, revision, &format)?;
        }
        Commands::Verify { file } => {
            commands::verify::run(&file)?;
        }
        Commands::Version => {
            println!("Revisor CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "History record format v{}",
                revisor_storage::HISTORY_VERSION
            );
        }
    }

    Ok(())
}
