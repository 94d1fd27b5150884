//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vaultkeeper_core::TextField;

#[derive(Parser)]
#[command(name = "vaultkeeper")]
#[command(about = "Manage a local ROM collection's metadata, media, and catalogs", long_about = None)]
pub(crate) struct Cli {
    /// Config file path (defaults to ~/.config/vaultkeeper/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Only show warnings and errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write log output to a file (ANSI codes stripped)
    #[arg(long, global = true)]
    pub logfile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Submit a task to the orchestrator and run it to completion
    Scrape {
        /// System/platform name (e.g. snes, genesis)
        #[arg(long)]
        system: String,

        /// Path to the metadata corpus XML for this platform
        #[arg(long)]
        corpus: PathBuf,

        /// Only scrape these ROM paths (relative to the catalog), comma separated
        #[arg(long, value_delimiter = ',')]
        only: Option<Vec<String>>,

        /// Emit partial-match candidates and prompt on stdin to apply one
        #[arg(long)]
        review_partial: bool,

        /// Overwrite fields that already have a value instead of only filling empty ones
        #[arg(long)]
        overwrite_text_fields: bool,

        /// Restrict the scrape to these fields (Name, Description, Genre, Developer, Publisher, Players, Rating), comma separated
        #[arg(long, value_delimiter = ',')]
        selected_fields: Option<Vec<TextField>>,
    },

    /// Task history and control
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Reconcile a system's catalog media fields against disk
    Reconcile {
        #[arg(long)]
        system: String,
    },

    /// Diff two gamelist.xml snapshots
    Diff {
        before: PathBuf,
        after: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum TaskAction {
    /// List known tasks, most recent first
    List,
    /// Print a task's full log file
    Show { id: uuid::Uuid },
    /// Request that a running or queued task stop
    Stop { id: uuid::Uuid },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Print the resolved configuration
    Show,
    /// Write out a default configuration file if one doesn't exist yet
    Setup,
    /// Print the configuration file path
    Path,
}
