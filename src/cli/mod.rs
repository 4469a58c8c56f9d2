//! CLI entry point for colloquy.

pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Multi-agent group conversations
#[derive(Parser, Debug)]
#[command(name = "colloquy", version, about = "Run multi-agent group conversations")]
pub struct Cli {
    /// Configuration file (TOML). Defaults to the per-user config if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario
    Run(RunArgs),
    /// List built-in scenarios
    Presets,
    /// Inspect stored participant memory
    Memory(MemoryArgs),
}

/// Arguments for `colloquy run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Built-in scenario name
    #[arg(long, conflicts_with = "scenario", required_unless_present = "scenario")]
    pub preset: Option<String>,

    /// Scenario file (TOML)
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Replace the opening message
    #[arg(short, long)]
    pub message: Option<String>,

    /// Replace the round limit
    #[arg(long)]
    pub max_rounds: Option<u64>,

    /// Never prompt; human proxies always auto-reply
    #[arg(long)]
    pub non_interactive: bool,

    /// Save memory-augmented participants after every reply
    #[arg(long)]
    pub save_memory: bool,
}

/// Arguments for the `memory` subcommand group.
#[derive(Args, Debug)]
pub struct MemoryArgs {
    #[command(subcommand)]
    pub command: MemoryCommands,
}

/// Memory subcommands.
#[derive(Subcommand, Debug)]
pub enum MemoryCommands {
    /// Print a participant's stored memory
    Show {
        name: String,
    },
    /// Delete a participant's stored memory
    Clear {
        name: String,
    },
    /// List participants with stored memory
    List,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
