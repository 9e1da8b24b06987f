//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for trellis using clap's derive API.
//!
//! # Commands
//!
//! - `init`: Create `.trellis/` with a config file and a seeded store
//! - `import`: Import a JSONL export of external issues
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//!
//! # Example
//!
//! ```bash
//! trellis init --tenant acme --product PROD-1 --user USER-1
//! trellis import issues.jsonl
//! TRELLIS_TENANT=globex trellis --json import issues.jsonl
//! ```

mod args;
mod execute;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};

// Re-export argument structs
pub use args::{ImportArgs, InitArgs};

// Re-export validators for external use
pub use validators::{validate_name, validate_product, validate_tenant, validate_user};

/// Trellis - import external issue trackers into a tenant's epics, features
/// and tasks
///
/// Imports are idempotent: records are matched by their external id, so
/// re-running an import only creates what is new.
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize trellis in the current directory
    ///
    /// Creates `.trellis/config.yaml` and a store seeded with the product and
    /// user that imports write against.
    Init(InitArgs),

    /// Import external issues from a JSONL file
    ///
    /// Epics are imported first, then features, then tasks. Records that
    /// already exist are reused. Prints a summary when done; Ctrl-C stops
    /// after the current record.
    Import(ImportArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        match &self.command {
            Some(Commands::Init(args)) => execute::execute_init(args, output_mode).await,
            Some(Commands::Import(args)) => execute::execute_import(args, output_mode).await,
            None => {
                println!("Trellis issue importer");
                println!("Use --help for more information");
                Ok(())
            }
        }
    }
}
