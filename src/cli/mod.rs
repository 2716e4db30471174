//! cli
//!
//! Command-line interface layer.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Assemble the engine context (config, git, forge)
//! - Delegate to command handlers
//!
//! The CLI layer is thin: it performs no repository mutations itself. All
//! state changes flow through the engine.

pub mod args;
pub mod commands;

pub use args::Cli;

use anyhow::Result;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`. Returns the process
/// exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse_args();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(commands::dispatch(cli))
}
