//! CLI command definitions and dispatch for the `forkline` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chats;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Branching chat backend: primary conversations with forkable clarification threads.
#[derive(Parser)]
#[command(name = "forkline", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to `{data_dir}/config.toml`).
    #[arg(long, global = true, env = "FORKLINE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (overrides `[server] port`).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides `[server] host`).
        #[arg(long)]
        host: Option<String>,
    },

    /// List primary chats.
    #[command(alias = "ls")]
    Chats,

    /// Print a chat transcript.
    Show {
        /// Chat ID to display.
        id: i64,

        /// Include system messages.
        #[arg(long)]
        all: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
