use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::Engine;

#[derive(Parser)]
#[command(name = "docsmith")]
#[command(about = "Keeps generated documentation in sync with the code that produced it")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one incremental documentation update pass
    Update {
        /// Branch whose changes should be documented
        #[arg(short, long)]
        branch: String,

        /// Base branch to diff against (defaults to the configured base)
        #[arg(long)]
        base: Option<String>,

        /// Dry run - show what would be regenerated without touching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the state of the artifact cache
    Status,

    /// Remove all cached artifact records
    Clear,
}

impl Cli {
    pub async fn execute(self, mut engine: Engine) -> Result<()> {
        match self.command {
            Commands::Update { branch, base, dry_run } => {
                engine.update(&branch, base.as_deref(), dry_run).await
            }
            Commands::Status => engine.status(),
            Commands::Clear => engine.clear(),
        }
    }
}
