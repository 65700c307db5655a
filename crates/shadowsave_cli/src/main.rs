//! ShadowSave CLI
//!
//! Command-line tools for inspecting and repairing save directories.
//!
//! # Commands
//!
//! - `status` - Display the transactional state of a save directory
//! - `recover` - Roll back an interrupted save or finish a committed cleanup

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ShadowSave command-line save directory tools.
#[derive(Parser)]
#[command(name = "shadowsave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the save directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the transactional state of a save directory
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Recover a save directory left behind by an interrupted save
    Recover {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Status { format } => {
            let path = cli.path.ok_or("Save directory path required for status")?;
            commands::status::run(&path, &format)?;
        }
        Commands::Recover { format } => {
            let path = cli.path.ok_or("Save directory path required for recover")?;
            commands::recover::run(&path, &format)?;
        }
        Commands::Version => {
            println!("ShadowSave CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ShadowSave Core v{}", shadowsave_core::VERSION);
        }
    }

    Ok(())
}
