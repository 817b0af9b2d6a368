use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use patchwright::core::{CacheAction, Engine};

#[derive(Parser)]
#[command(name = "patchwright")]
#[command(about = "Project context assembly and change analysis for AI-assisted coding")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Project root (defaults to current directory)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble project context for an intent
    Context {
        /// What you want to change, in plain words
        intent: String,

        /// Additional target files
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Print the bundle as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the file references found in a piece of text
    Refs {
        text: String,
    },

    /// Compare two versions of a file
    Diff {
        original: PathBuf,
        modified: PathBuf,

        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or maintain the context cache snapshot
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Show entry count, hit/miss counters and size
    Stats,
    /// Remove every entry
    Clear,
    /// Remove expired entries
    Cleanup,
    /// Write the cache to a snapshot file
    Export { path: PathBuf },
    /// Load a snapshot file into the cache
    Import { path: PathBuf },
}

impl From<CacheCommand> for CacheAction {
    fn from(command: CacheCommand) -> Self {
        match command {
            CacheCommand::Stats => CacheAction::Stats,
            CacheCommand::Clear => CacheAction::Clear,
            CacheCommand::Cleanup => CacheAction::Cleanup,
            CacheCommand::Export { path } => CacheAction::Export(path),
            CacheCommand::Import { path } => CacheAction::Import(path),
        }
    }
}

impl Cli {
    pub async fn execute(self, engine: Engine) -> Result<()> {
        match self.command {
            Commands::Context { intent, files, json } => {
                engine.context(&intent, &files, json).await
            }
            Commands::Refs { text } => {
                engine.references(&text)
            }
            Commands::Diff { original, modified, json } => {
                engine.diff(&original, &modified, json).await
            }
            Commands::Cache { action } => {
                engine.cache_command(action.into())
            }
        }
    }
}
