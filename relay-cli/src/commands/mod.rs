//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod run;
mod validate;

use anyhow::{Context, Result};
use clap::Subcommand;
use relay_core::Pipeline;
use std::path::{Path, PathBuf};

use crate::config::Overrides;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline and emit its result as JSON
    Run {
        /// Pipeline definition (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Container engine binary
        #[arg(long, env = "RELAY_ENGINE")]
        engine: Option<String>,

        /// Shared volume name (default: relay-<uuid>)
        #[arg(long, env = "RELAY_VOLUME")]
        volume: Option<String>,

        /// Timeout for each engine invocation, in seconds
        #[arg(long, env = "RELAY_INVOCATION_TIMEOUT")]
        timeout: Option<u64>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a pipeline definition and print its stage plan
    Validate {
        /// Pipeline definition (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },
}

/// Handle a CLI command
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            file,
            engine,
            volume,
            timeout,
            output,
        } => {
            let overrides = Overrides {
                engine,
                volume,
                timeout,
            };
            run::run_pipeline(&file, overrides, output.as_deref()).await
        }
        Commands::Validate { file } => validate::validate_pipeline(&file),
    }
}

/// Reads and parses a pipeline definition
fn load_pipeline(path: &Path) -> Result<Pipeline> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse pipeline file: {}", path.display()))
}
