//! engine::classify
//!
//! The diff classifier: determine each selected commit's remote identity and
//! the action to take.
//!
//! Classification is the last read-only phase. It consults the forge for
//! every commit that claims a pull request, checks the source-id fence
//! against the remote `orig` branch, and allocates gh numbers for new diffs.
//! Every rejection in the decision table fires here, before any write.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::core::ledger::ConsumedLedger;
use crate::core::naming::{gh_branch, BranchKind, GhBranchName};
use crate::core::types::GhNumber;
use crate::forge::{with_retry, PullRequest};
use crate::msg;

use super::select::{LocalCommit, Selection};
use super::{Error, StackContext};

/// What the submission engine should do for one diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Never pushed: allocate branches and open a PR.
    New,
    /// Existing PR: synchronize branches and metadata. May resolve to a
    /// no-op at execution time, which is reported as skipped.
    Update,
    /// Zero tree delta on a commit with no PR: nothing to open, ignored.
    SkipEmpty,
}

/// The remote state of an already-submitted diff.
#[derive(Debug, Clone)]
pub struct RemoteDiff {
    /// The open pull request.
    pub pr: PullRequest,
    /// Source id last written by the engine, read from the remote `orig` tip.
    pub remote_source_id: Option<String>,
    /// Stack comment id, if the PR was created in direct mode.
    pub comment_id: Option<u64>,
    /// Tip of the remote head branch.
    pub head: crate::core::types::Oid,
    /// Tree of the remote head tip.
    pub head_tree: crate::core::types::TreeOid,
    /// Tip and tree of the remote base branch (stack mode only).
    pub base: Option<(crate::core::types::Oid, crate::core::types::TreeOid)>,
    /// Tip of the remote orig branch, if it exists.
    pub orig: Option<crate::core::types::Oid>,
}

/// One classified diff, ready for execution.
#[derive(Debug, Clone)]
pub struct DiffPlan {
    /// The local commit.
    pub commit: LocalCommit,
    /// Recomputed source id for the commit as it stands now.
    pub source_id: String,
    /// The action to take.
    pub action: Action,
    /// The diff's sticky number.
    pub ghnum: GhNumber,
    /// Owner of the branch namespace (may differ from ours for a stack
    /// originally submitted by someone else).
    pub username: String,
    /// Remote state, present iff `action` is `Update`.
    pub remote: Option<RemoteDiff>,
}

impl DiffPlan {
    /// Branch name of the given kind for this diff.
    pub fn branch(&self, kind: BranchKind) -> String {
        gh_branch(&self.username, self.ghnum, kind)
    }
}

/// Allocates fresh gh numbers.
///
/// Scans the remote `gh/<username>/` namespace and the consumed ledger for
/// the highest number ever used, then hands out sequential numbers, skipping
/// any currently held by an open PR.
struct Allocator {
    next: GhNumber,
    unavailable: HashSet<u64>,
}

impl Allocator {
    fn allocate(&mut self) -> GhNumber {
        while self.unavailable.contains(&self.next.get()) {
            self.next = self.next.next();
        }
        let n = self.next;
        self.next = self.next.next();
        n
    }
}

async fn build_allocator(ctx: &StackContext<'_>) -> Result<Allocator, Error> {
    let prefix = format!("refs/remotes/{}/gh/{}/", ctx.remote, ctx.username);
    let mut max_used = 0u64;
    for entry in ctx.git.list_refs_by_prefix(&prefix)? {
        let Some(branch) = entry.name.strip_prefix(&format!("refs/remotes/{}/", ctx.remote))
        else {
            continue;
        };
        if let Some(parsed) = GhBranchName::parse(branch) {
            max_used = max_used.max(parsed.ghnum.get());
        }
    }

    let ledger = ConsumedLedger::read(ctx.git)?;
    if let Some(n) = ledger.max() {
        max_used = max_used.max(n.get());
    }

    // Numbers currently held by open PRs can sit above our max if their
    // branches were pruned; skip them rather than colliding.
    let mut unavailable = HashSet::new();
    let open = with_retry("list_open_prs", || ctx.forge.list_open_prs()).await?;
    for pr in open {
        if let Some(parsed) = GhBranchName::parse(&pr.head_ref) {
            if parsed.username == ctx.username {
                unavailable.insert(parsed.ghnum.get());
            }
        }
    }

    Ok(Allocator {
        next: GhNumber::new(max_used + 1),
        unavailable,
    })
}

/// Classify every commit in the submit set.
///
/// Runs to completion before any write; the returned plans are in stack
/// order, oldest first.
pub async fn classify(
    ctx: &StackContext<'_>,
    selection: &Selection,
    force: bool,
) -> Result<Vec<DiffPlan>, Error> {
    let mut plans = Vec::new();
    let mut seen_ghnums: HashSet<(String, u64)> = HashSet::new();
    let mut allocator: Option<Allocator> = None;

    for commit in selection.commits.iter().filter(|c| c.submit) {
        let source_id = msg::source_id(
            &commit.info.tree,
            &commit.parsed.prose,
            &commit.parsed.trailers,
        );

        let pr_ref = commit.parsed.pull_request(&ctx.github_url);

        let plan = match pr_ref {
            None => {
                if commit.is_empty() {
                    debug!(oid = %commit.info.oid, "skipping empty commit with no PR");
                    DiffPlan {
                        commit: commit.clone(),
                        source_id,
                        action: Action::SkipEmpty,
                        ghnum: GhNumber::new(0),
                        username: ctx.username.clone(),
                        remote: None,
                    }
                } else {
                    if allocator.is_none() {
                        allocator = Some(build_allocator(ctx).await?);
                    }
                    let ghnum = allocator.as_mut().unwrap().allocate();
                    debug!(oid = %commit.info.oid, %ghnum, "new diff");
                    DiffPlan {
                        commit: commit.clone(),
                        source_id,
                        action: Action::New,
                        ghnum,
                        username: ctx.username.clone(),
                        remote: None,
                    }
                }
            }
            Some(pr_ref) => {
                if pr_ref.owner != ctx.owner || pr_ref.repo != ctx.repo {
                    return Err(Error::NotAGhstackPr {
                        oid: commit.info.oid.clone(),
                    });
                }

                let pr = with_retry("get_pr", || ctx.forge.get_pr(pr_ref.number)).await?;

                let head_branch = pr
                    .head_ref
                    .strip_prefix("refs/heads/")
                    .unwrap_or(&pr.head_ref);
                let Some(gh_name) = GhBranchName::parse(head_branch)
                    .filter(|b| b.kind == BranchKind::Head)
                else {
                    return Err(Error::NotAGhstackPr {
                        oid: commit.info.oid.clone(),
                    });
                };

                if !pr.state.is_open() {
                    let orig_ref = ctx
                        .git
                        .remote_ref(&ctx.remote, &gh_name.sibling(BranchKind::Orig));
                    if ctx.git.try_resolve_ref(&orig_ref)?.is_none() {
                        return Err(Error::ClosedPrBranchDeleted { number: pr.number });
                    }
                    // Closed but the branches survive: the commit gets a
                    // fresh number and a fresh PR.
                    if allocator.is_none() {
                        allocator = Some(build_allocator(ctx).await?);
                    }
                    let ghnum = allocator.as_mut().unwrap().allocate();
                    warn!(
                        number = pr.number,
                        "PR is closed; opening a new PR for this commit"
                    );
                    DiffPlan {
                        commit: commit.clone(),
                        source_id,
                        action: Action::New,
                        ghnum,
                        username: ctx.username.clone(),
                        remote: None,
                    }
                } else {
                    if !seen_ghnums.insert((gh_name.username.clone(), gh_name.ghnum.get())) {
                        return Err(Error::DuplicateGhNumber { number: pr.number });
                    }

                    let remote =
                        elaborate_remote(ctx, &gh_name, pr, commit, &source_id, force)?;

                    DiffPlan {
                        commit: commit.clone(),
                        source_id,
                        action: Action::Update,
                        ghnum: gh_name.ghnum,
                        username: gh_name.username.clone(),
                        remote: Some(remote),
                    }
                }
            }
        };

        plans.push(plan);
    }

    Ok(plans)
}

/// Resolve the remote branch state for an existing diff and enforce the
/// source-id fence.
fn elaborate_remote(
    ctx: &StackContext<'_>,
    gh_name: &GhBranchName,
    pr: PullRequest,
    commit: &LocalCommit,
    _recomputed_source_id: &str,
    force: bool,
) -> Result<RemoteDiff, Error> {
    let git = ctx.git;

    let head_ref = git.remote_ref(&ctx.remote, &gh_name.to_branch());
    let head = git.resolve_ref(&head_ref)?;
    let head_tree = git.tree_of(&head)?;

    let base = if ctx.mode.is_direct() {
        None
    } else {
        let base_ref = git.remote_ref(&ctx.remote, &gh_name.sibling(BranchKind::Base));
        match git.try_resolve_ref(&base_ref)? {
            Some(oid) => {
                let tree = git.tree_of(&oid)?;
                Some((oid, tree))
            }
            None => None,
        }
    };

    let orig_ref = git.remote_ref(&ctx.remote, &gh_name.sibling(BranchKind::Orig));
    let orig = git.try_resolve_ref(&orig_ref)?;

    let (remote_source_id, comment_id) = match &orig {
        Some(orig_oid) => {
            let info = git.commit_info(orig_oid)?;
            let parsed = msg::parse(&info.message);
            (
                parsed.recorded_source_id().map(|s| s.to_string()),
                parsed.comment_id(),
            )
        }
        None => {
            warn!(
                number = pr.number,
                "remote orig branch is missing; assuming we are up-to-date"
            );
            (None, None)
        }
    };

    // The concurrent-edit fence: the source id recorded on the local commit
    // must match what the engine last wrote to the remote orig. A local
    // commit with no recorded id predates source ids (or was hand-built);
    // assume it is current rather than stranding the user.
    match (commit.parsed.recorded_source_id(), &remote_source_id) {
        (Some(local), Some(remote)) if local != remote.as_str() && !force => {
            debug!(local, remote = remote.as_str(), "source id mismatch");
            return Err(Error::ConcurrentRemoteUpdate {
                local_source_id: local.to_string(),
            });
        }
        (None, _) => {
            warn!(
                number = pr.number,
                "local commit has no ghstack-source-id; assuming it is up-to-date with remote"
            );
        }
        (_, None) => {
            warn!(
                number = pr.number,
                "remote commit has no ghstack-source-id; assuming we are up-to-date with remote"
            );
        }
        _ => {}
    }

    Ok(RemoteDiff {
        pr,
        remote_source_id,
        comment_id,
        head,
        head_tree,
        base,
        orig,
    })
}
