//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global flags
//!
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Submit a stack of commits to GitHub as interlinked pull requests.
#[derive(Parser, Debug)]
#[command(name = "ghstack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if ghstack was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
///
/// Running ghstack with no subcommand is equivalent to `ghstack submit`.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit the current stack of commits as pull requests
    Submit(SubmitArgs),

    /// Land an accepted stack into the upstream default branch
    Land {
        /// URL of the pull request to land (lands it and everything below)
        pr_url: String,

        /// Land even if the stack looks out of sync with GitHub
        #[arg(short, long)]
        force: bool,
    },

    /// Strip ghstack trailers from local commits so the next submit opens
    /// fresh pull requests
    Unlink {
        /// Commits to unlink (default: the whole stack)
        commits: Vec<String>,
    },
}

/// Arguments for `ghstack submit`.
#[derive(clap::Args, Debug, Default)]
pub struct SubmitArgs {
    /// Revisions to submit (default: HEAD)
    pub revs: Vec<String>,

    /// Description of the update, recorded in synthetic commit messages
    #[arg(short, long, default_value = "Update")]
    pub message: String,

    /// Submit even if the stack is long or looks stale on GitHub
    #[arg(short, long)]
    pub force: bool,

    /// Overwrite PR title and body with the local commit message
    #[arg(long)]
    pub update_fields: bool,

    /// Print only the PR URLs, top of stack first
    #[arg(long)]
    pub short: bool,

    /// Do not skip unchanged diffs
    #[arg(long)]
    pub no_skip: bool,

    /// Open newly created PRs as drafts
    #[arg(long)]
    pub draft: bool,

    /// Base branch the bottom of the stack targets (default: the
    /// repository's default branch)
    #[arg(long)]
    pub base: Option<String>,

    /// Target PRs directly at each other instead of synthetic base branches
    #[arg(long)]
    pub direct: bool,

    /// Submit exactly the named revisions instead of everything reachable
    #[arg(long)]
    pub no_stack: bool,

    /// Classify and report what would happen without writing anything
    #[arg(long)]
    pub dry_run: bool,
}
