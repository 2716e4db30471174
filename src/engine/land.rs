//! engine::land
//!
//! The land engine: fast-forward the upstream default branch with a landed
//! stack, close the pull requests, delete their branches, and retire their
//! gh numbers.
//!
//! Landing PR #k lands #1..#k and leaves everything above open. The remote
//! `orig` chain is the source of truth for what lands; local state is not
//! consulted. Each landed commit is re-minted on top of the trunk with the
//! original author preserved, the landing user as committer, and the
//! trailers reduced to the canonical `Pull Request resolved:` line.

use tracing::{info, warn};

use crate::core::ledger::ConsumedLedger;
use crate::core::naming::{BranchKind, GhBranchName};
use crate::core::types::{GhNumber, Oid, PullRequestRef};
use crate::forge::{with_retry, PullRequest};
use crate::git::push_spec;
use crate::msg::{self, Trailer};

use super::{Error, StackContext};

/// How many times a non-fast-forward push is retried after re-fetching.
const FF_PUSH_ATTEMPTS: u32 = 3;

/// Options for one land run.
#[derive(Debug, Clone, Default)]
pub struct LandOptions {
    /// Land even if the remote head and orig branches disagree.
    pub force: bool,
}

/// The outcome of a land run.
#[derive(Debug, Clone)]
pub struct LandResult {
    /// PR numbers landed, bottom first.
    pub landed: Vec<u64>,
    /// New tip of the default branch.
    pub new_tip: Oid,
}

/// One entry of the stack being landed.
struct LandEntry {
    pr: PullRequest,
    gh_name: GhBranchName,
    /// The orig commit this entry lands.
    orig: crate::git::CommitInfo,
}

/// Land the stack up to and including the given PR URL.
pub async fn run_land(
    ctx: &StackContext<'_>,
    pr_url: &str,
    options: &LandOptions,
) -> Result<LandResult, Error> {
    let git = ctx.git;

    let pr_ref =
        PullRequestRef::parse_url(pr_url, &ctx.github_url).map_err(|_| Error::BadPullRequestUrl {
            url: pr_url.to_string(),
        })?;
    if pr_ref.owner != ctx.owner || pr_ref.repo != ctx.repo {
        return Err(Error::BadPullRequestUrl {
            url: pr_url.to_string(),
        });
    }

    git.fetch(&ctx.remote)?;

    let pr = with_retry("get_pr", || ctx.forge.get_pr(pr_ref.number)).await?;
    let head_branch = pr.head_ref.strip_prefix("refs/heads/").unwrap_or(&pr.head_ref);
    let Some(gh_name) =
        GhBranchName::parse(head_branch).filter(|b| b.kind == BranchKind::Head)
    else {
        return Err(Error::NotAGhstackBranch {
            head_ref: pr.head_ref.clone(),
        });
    };
    if !pr.state.is_open() {
        return Err(Error::LandPrNotOpen {
            number: pr.number,
            state: pr.state.to_string(),
        });
    }

    // The remote orig chain below (and including) this PR is what lands.
    let orig_ref = git.remote_ref(&ctx.remote, &gh_name.sibling(BranchKind::Orig));
    let orig_tip = git.resolve_ref(&orig_ref)?;

    let trunk_ref = ctx.base_ref();
    let mut trunk_tip = git.resolve_ref(&trunk_ref)?;

    let merge_base = git
        .merge_base(&trunk_tip, &orig_tip)?
        .ok_or_else(|| Error::Invariant("stack shares no history with the trunk".into()))?;

    let mut entries = Vec::new();
    for oid in git.rev_list(&orig_tip, Some(&merge_base))? {
        let info = git.commit_info(&oid)?;
        let parsed = msg::parse(&info.message);

        let Some(entry_ref) = parsed.pull_request(&ctx.github_url) else {
            return Err(Error::NotAGhstackPr { oid });
        };
        let entry_pr = with_retry("get_pr", || ctx.forge.get_pr(entry_ref.number)).await?;
        if !entry_pr.state.is_open() {
            return Err(Error::LandPrNotOpen {
                number: entry_pr.number,
                state: entry_pr.state.to_string(),
            });
        }

        let entry_head =
            entry_pr.head_ref.strip_prefix("refs/heads/").unwrap_or(&entry_pr.head_ref);
        let Some(entry_name) =
            GhBranchName::parse(entry_head).filter(|b| b.kind == BranchKind::Head)
        else {
            return Err(Error::NotAGhstackBranch {
                head_ref: entry_pr.head_ref.clone(),
            });
        };

        // Sync fence: what the PR shows for review must match what the orig
        // chain says we are landing.
        let head_ref = git.remote_ref(&ctx.remote, &entry_name.to_branch());
        let head_tip = git.resolve_ref(&head_ref)?;
        if git.tree_of(&head_tip)? != info.tree && !options.force {
            return Err(Error::LandOutOfSync {
                number: entry_pr.number,
            });
        }

        entries.push(LandEntry {
            pr: entry_pr,
            gh_name: entry_name,
            orig: info,
        });
    }

    if entries.is_empty() {
        return Err(Error::EmptyStack);
    }

    // Fast-forward push with bounded retries: re-fetch and rebuild the
    // landed chain each time the trunk moves under us.
    let mut attempts = 0;
    let new_tip = loop {
        attempts += 1;
        let candidate = build_landed_chain(ctx, &trunk_tip, &entries)?;
        match git.push(
            &ctx.remote,
            &[push_spec(&candidate, &ctx.default_branch)],
            false,
        ) {
            Ok(()) => break candidate,
            Err(e) if is_non_fast_forward(&e) && attempts < FF_PUSH_ATTEMPTS => {
                warn!(attempt = attempts, error = %e, "push was not fast-forward, refetching");
                git.fetch(&ctx.remote)?;
                trunk_tip = git.resolve_ref(&trunk_ref)?;
            }
            Err(e) if is_non_fast_forward(&e) => {
                return Err(Error::LandNonFastForward {
                    branch: ctx.default_branch.clone(),
                    attempts: FF_PUSH_ATTEMPTS,
                });
            }
            Err(e) => return Err(e.into()),
        }
    };

    // The trunk now carries the stack; close out the PRs and retire their
    // numbers. Branch deletion is best-effort: a failure leaves garbage, not
    // corruption.
    let mut landed = Vec::new();
    let mut consumed: Vec<GhNumber> = Vec::new();
    for entry in &entries {
        with_retry("close_pr", || ctx.forge.close_pr(entry.pr.number)).await?;
        info!(number = entry.pr.number, "closed PR #{}", entry.pr.number);

        for kind in [BranchKind::Head, BranchKind::Base, BranchKind::Orig] {
            let branch = entry.gh_name.sibling(kind);
            if let Err(e) = ctx.forge.delete_branch(&branch).await {
                warn!(branch = %branch, error = %e, "failed to delete branch, continuing");
            }
        }

        landed.push(entry.pr.number);
        consumed.push(entry.gh_name.ghnum);
    }

    let mut ledger = ConsumedLedger::read(git)?;
    ledger.consume(git, &consumed)?;

    Ok(LandResult { landed, new_tip })
}

/// Whether a push failure was a fast-forward rejection (retryable) rather
/// than a transport or permission problem.
fn is_non_fast_forward(e: &crate::git::GitError) -> bool {
    match e {
        crate::git::GitError::CommandFailed { stderr, .. } => {
            stderr.contains("non-fast-forward")
                || stderr.contains("fetch first")
                || stderr.contains("stale info")
        }
        _ => false,
    }
}

/// Re-mint the orig chain on top of the trunk tip.
fn build_landed_chain(
    ctx: &StackContext<'_>,
    trunk_tip: &Oid,
    entries: &[LandEntry],
) -> Result<Oid, Error> {
    let git = ctx.git;
    let mut tip = trunk_tip.clone();

    for entry in entries {
        let parsed = msg::parse(&entry.orig.message);

        // Keep user trailers; replace the ghstack block with the canonical
        // resolution line only.
        let mut trailers = parsed.user_trailers();
        trailers.push(Trailer::new(
            msg::PULL_REQUEST_RESOLVED_KEY,
            entry.pr.url.clone(),
        ));
        let message = msg::emit(&parsed.prose, &trailers);

        tip = git.commit_tree(
            &entry.orig.tree,
            &[&tip],
            &message,
            Some(&entry.orig.author),
        )?;
    }

    Ok(tip)
}
