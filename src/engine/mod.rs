//! engine
//!
//! The stack synchronization engine.
//!
//! # Lifecycle
//!
//! Every submit follows the same phases:
//!
//! ```text
//! fetch -> select -> classify -> execute
//! ```
//!
//! Selection and classification are read-only; every rejection in the
//! taxonomy fires before the first write. Execution then walks the stack
//! bottom to top, and within one diff writes `base`, then `head`, then the
//! pull request, then `orig`, so an interrupted run always leaves a
//! consistent prefix that a rerun picks up from.
//!
//! `land` and `unlink` are independent entry points sharing the same context
//! and error taxonomy.

pub mod classify;
pub mod land;
pub mod select;
pub mod submit;
pub mod unlink;

pub use classify::{classify, Action, DiffPlan};
pub use land::{run_land, LandOptions, LandResult};
pub use select::{select, LocalCommit, Selection};
pub use submit::{run_submit, IgnoredDiff, SubmitOptions, SubmitResult, SubmittedDiff, WhatHappened};
pub use unlink::{run_unlink, UnlinkResult};

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::core::ledger::LedgerError;
use crate::core::types::Oid;
use crate::forge::{Forge, ForgeError};
use crate::git::{Git, GitError};

/// Marker planted in every synthetic `head`/`base` commit message.
///
/// Its presence in a commit being submitted means the user checked out a
/// branch ghstack generated, which can never be validly resubmitted.
pub const POISONED_MARKER: &str = "[ghstack-poisoned]";

/// Which PR layout strategy is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `base` is a synthetic branch owned by ghstack; review diffs stay
    /// stable while upstream moves forward.
    Stack,
    /// `base` is a real upstream branch (the trunk, or the predecessor's
    /// `head`); no synthetic base branch exists.
    Direct,
}

impl Mode {
    pub fn is_direct(&self) -> bool {
        matches!(self, Mode::Direct)
    }
}

/// Everything the engine needs to know about where it is operating.
///
/// Threaded explicitly through every engine entry point; there is no global
/// configuration.
pub struct StackContext<'a> {
    pub git: &'a Git,
    pub forge: &'a dyn Forge,
    /// GitHub username doing the submitting; owns the branch namespace.
    pub username: String,
    /// Upstream remote name.
    pub remote: String,
    /// Forge host, e.g. `github.com`.
    pub github_url: String,
    /// Repository owner on the forge.
    pub owner: String,
    /// Repository name on the forge.
    pub repo: String,
    /// The branch the bottom of the stack targets.
    pub default_branch: String,
    /// PR layout strategy.
    pub mode: Mode,
    /// Refuse stacks longer than this without `--force`.
    pub throttle: usize,
}

impl StackContext<'_> {
    /// The remote-tracking ref of the stack base branch.
    pub fn base_ref(&self) -> String {
        self.git.remote_ref(&self.remote, &self.default_branch)
    }
}

/// Errors from the engine.
///
/// Everything except [`Error::Invariant`] is either a user error or an
/// infrastructure failure and exits with code 1; an invariant violation is a
/// bug in ghstack and exits with code 2.
#[derive(Debug, Error)]
pub enum Error {
    #[error("There appears to be no commits to process, based on the revs you passed me.")]
    EmptyStack,

    #[error(
        "Cowardly refusing to handle a stack with more than {limit} PRs.  \
         You are likely to get rate limited by GitHub if you try to create or \
         manipulate this many PRs.  You can bypass this throttle using --force"
    )]
    StackTooLong { len: usize, limit: usize },

    #[error(
        "This commit is poisoned: it is from a head or base branch--ghstack \
         cannot validly submit it.  The most common situation for this to \
         happen is if you checked out the head branch of a pull request that \
         was previously submitted with ghstack.  Fetch the original commits \
         with `ghstack checkout $PR_URL` instead; aborting."
    )]
    PoisonedCommit { oid: Oid },

    #[error(
        "The commit {oid} has {count} parents, which makes my head explode.  \
         `git rebase -i` your diffs into a stack, then try again."
    )]
    MergeCommit { oid: Oid, count: usize },

    #[error(
        "Something very strange has happened: a commit for the pull request \
         #{number} occurs twice in your local commit stack.  This is usually \
         because of a botched rebase.  Please take a look at your git log and \
         seek help from your local Git expert."
    )]
    DuplicateGhNumber { number: u64 },

    #[error(
        "Cannot ghstack a stack with closed PR #{number} whose branch was deleted.  \
         If you were just trying to update a later PR in the stack, `git rebase` \
         and try again.  Otherwise, you may have been trying to update a PR that \
         was already closed.  To disassociate your update from the old PR and \
         open a new PR, run `ghstack unlink`, `git rebase` and then try again."
    )]
    ClosedPrBranchDeleted { number: u64 },

    #[error(
        "Cowardly refusing to push an update to GitHub, since it looks \
         another source has updated GitHub since you last pushed.  If you \
         want to push anyway, rerun this command with --force.  Otherwise, \
         diff your changes against {local_source_id} and reapply them on top \
         of an up-to-date commit from GitHub."
    )]
    ConcurrentRemoteUpdate { local_source_id: String },

    #[error(
        "This commit appears to already be associated with a pull request, \
         but the pull request doesn't look like it was submitted by ghstack.  \
         If you think this is in error, run:\n\n    ghstack unlink {oid}\n\n\
         to disassociate the commit with the pull request, and then try again.  \
         (This will create a new pull request!)"
    )]
    NotAGhstackPr { oid: Oid },

    #[error(
        "Cowardly refusing to upload diffs to a repository that is a fork.  \
         ghstack expects '{remote}' of your Git checkout to point to the \
         upstream repository in question.  If your checkout does not comply, \
         please adjust your remotes or change the 'remote_name' field in your \
         .ghstackrc file."
    )]
    RepoIsFork { remote: String },

    #[error("The ref {head_ref} doesn't look like a ghstack branch")]
    NotAGhstackBranch { head_ref: String },

    #[error("{url} doesn't look like a pull request URL on this repository")]
    BadPullRequestUrl { url: String },

    #[error("PR #{number} is {state}; only a stack of open PRs can be landed")]
    LandPrNotOpen { number: u64, state: String },

    #[error(
        "The stack for PR #{number} was updated on GitHub since you last \
         pushed.  Run ghstack to synchronize, or pass --force to land what \
         is on GitHub anyway."
    )]
    LandOutOfSync { number: u64 },

    #[error(
        "Could not fast-forward {branch}: the remote kept moving while \
         landing (tried {attempts} times).  Fetch and try again."
    )]
    LandNonFastForward { branch: String, attempts: u32 },

    #[error(
        "unlink can only process commits which are on the current stack; \
         these commits are not:\n{commits}"
    )]
    UnlinkOutsideStack { commits: String },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A bug in ghstack, not a user error.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Invariant(_) => 2,
            _ => 1,
        }
    }
}

/// Resolve repository metadata and guard against forks.
///
/// Shared entry check for submit and land, run before a context is built
/// (the repository's default branch comes from the answer).
pub async fn repo_preflight(
    forge: &dyn Forge,
    remote: &str,
) -> Result<crate::forge::RepoInfo, Error> {
    let repo = crate::forge::with_retry("get_repo", || forge.get_repo()).await?;
    if repo.is_fork {
        return Err(Error::RepoIsFork {
            remote: remote.to_string(),
        });
    }
    Ok(repo)
}