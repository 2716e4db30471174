//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Each handler assembles the engine context from configuration and the
//! repository, calls the engine, and formats output. Handlers perform no
//! repository mutations directly.

mod land;
mod submit;
mod unlink;

pub use land::land;
pub use submit::submit;
pub use unlink::unlink;

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};

use crate::cli::args::{Cli, Command, SubmitArgs};
use crate::core::config::{self, Config};
use crate::engine::{Error, Mode, StackContext};
use crate::forge::github::GitHubForge;
use crate::git::{self, Git};
use crate::ui::output::{self, Verbosity};

/// Everything a command needs before the engine takes over.
pub struct Session {
    pub git: Git,
    pub config: Config,
    pub owner: String,
    pub repo: String,
    pub verbosity: Verbosity,
}

impl Session {
    /// Open the repository, load configuration, and identify the upstream
    /// repository from the remote URL.
    pub fn open(cwd: Option<PathBuf>, quiet: bool) -> Result<Self> {
        let cwd = match cwd {
            Some(dir) => dir,
            None => std::env::current_dir().context("cannot determine working directory")?,
        };
        let git = Git::open(&cwd)?;
        let config = config::load(git.workdir())?;

        let remote = config.remote_name.clone();
        let url = git
            .remote_url(&remote)?
            .with_context(|| format!("remote '{}' is not configured", remote))?;
        let Some((owner, repo)) = git::parse_remote_url(&url, &config.github_url) else {
            bail!(
                "remote '{}' ({}) does not point at {}",
                remote,
                url,
                config.github_url
            );
        };

        Ok(Self {
            git,
            config,
            owner,
            repo,
            verbosity: Verbosity::from_flags(quiet),
        })
    }

    /// Build the GitHub forge client for this session.
    pub fn forge(&self) -> Result<GitHubForge> {
        let token = self.config.require_token()?;
        Ok(GitHubForge::new(
            token,
            &self.owner,
            &self.repo,
            &self.config.github_url,
        ))
    }

    /// Build the engine context.
    ///
    /// `default_branch` is the resolved stack base (from `--base` or the
    /// repository's default branch).
    pub fn stack_context<'a>(
        &'a self,
        forge: &'a dyn crate::forge::Forge,
        default_branch: String,
        mode: Mode,
    ) -> Result<StackContext<'a>> {
        Ok(StackContext {
            git: &self.git,
            forge,
            username: self.config.require_username()?.to_string(),
            remote: self.config.remote_name.clone(),
            github_url: self.config.github_url.clone(),
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            default_branch,
            mode,
            throttle: self.config.max_stack_size,
        })
    }
}

/// Dispatch a parsed command line, returning the process exit code.
pub async fn dispatch(cli: Cli) -> Result<i32> {
    let command = cli.command.unwrap_or(Command::Submit(SubmitArgs {
        message: "Update".to_string(),
        ..Default::default()
    }));

    let result = match command {
        Command::Submit(args) => submit(cli.cwd, cli.quiet, args).await,
        Command::Land { pr_url, force } => land(cli.cwd, cli.quiet, &pr_url, force).await,
        Command::Unlink { commits } => unlink(cli.cwd, cli.quiet, &commits),
    };

    match result {
        Ok(()) => Ok(0),
        Err(e) => {
            output::error(&e);
            // Engine errors carry their own exit codes; anything else is a
            // plain user-facing failure.
            Ok(match e.downcast_ref::<Error>() {
                Some(engine_err) => engine_err.exit_code(),
                None => 1,
            })
        }
    }
}
