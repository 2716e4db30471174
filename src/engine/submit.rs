//! engine::submit
//!
//! The submission engine: execute creates and updates on the per-diff
//! `base`/`head`/`orig` branches, mint synthetic merge commits, and open or
//! patch pull requests.
//!
//! # How a commit becomes a pull request
//!
//! Here is the relevant state for one diff:
//!
//! - local parent tree
//! - local commit tree
//! - remote base branch
//! - remote head branch
//!
//! The job is to synchronize local with remote without ever force-pushing
//! `base` or `head`:
//!
//! - Nothing changed: do nothing.
//! - Only this commit changed: the local parent tree still matches the
//!   remote base tree, so push one new commit to `head`; no merge needed.
//! - An earlier commit changed (or the stack was rebased): the parent tree
//!   no longer matches the remote base tree, so push a base-update commit
//!   carrying the new parent tree, then a head commit merging the old head
//!   with the new base.
//!
//! Counterintuitively, in stack mode the `base` of a diff has no ancestry
//! relationship to the `head` of the diff below it; that is what makes it
//! possible to update one diff without touching its neighbors.
//!
//! # Write ordering
//!
//! Per diff: `base`, then `head`, then the pull request, then `orig`.
//! Diffs go bottom to top. `orig` is only ever written after the diff's
//! `head` and `base` pushes succeeded, so an interrupted run leaves the
//! remote in a state a rerun can classify correctly. Base updates MUST land
//! before head updates, otherwise the forge attributes the new upstream
//! commits to the pull request itself.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::body;
use crate::core::naming::BranchKind;
use crate::core::types::Oid;
use crate::forge::{with_retry, CreatePrRequest, UpdatePrRequest};
use crate::git::push_spec;
use crate::msg::{self, Trailer};

use super::classify::{classify, Action, DiffPlan};
use super::select::{select, LocalCommit};
use super::{Error, StackContext, POISONED_MARKER};

/// Options for one submit run.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Human description of the update, used in synthetic commit messages.
    pub message: String,
    /// Clobber PR title and body with the local commit message.
    pub update_fields: bool,
    /// Bypass the source-id fence and the stack throttle.
    pub force: bool,
    /// Report unchanged diffs as updated instead of skipped.
    pub no_skip: bool,
    /// Open new PRs as drafts.
    pub draft: bool,
    /// Revision subset to submit (empty means HEAD).
    pub revs: Vec<String>,
    /// rev-list semantics: a rev selects everything reachable from it.
    pub stack: bool,
    /// Classify and report only; no writes.
    pub dry_run: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            message: "Update".to_string(),
            update_fields: false,
            force: false,
            no_skip: false,
            draft: false,
            revs: Vec::new(),
            stack: true,
            dry_run: false,
        }
    }
}

/// What happened to one diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhatHappened {
    Created,
    Updated,
    Skipped,
}

impl std::fmt::Display for WhatHappened {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WhatHappened::Created => write!(f, "Created"),
            WhatHappened::Updated => write!(f, "Updated"),
            WhatHappened::Skipped => write!(f, "Skipped"),
        }
    }
}

/// One submitted diff, as reported back to the user.
#[derive(Debug, Clone)]
pub struct SubmittedDiff {
    pub number: u64,
    pub pr_url: String,
    pub ghnum: crate::core::types::GhNumber,
    pub title: String,
    pub what: WhatHappened,
}

/// A commit that was ignored because it had no changes.
#[derive(Debug, Clone)]
pub struct IgnoredDiff {
    pub oid: Oid,
    pub title: String,
}

/// The outcome of a submit run.
#[derive(Debug, Clone, Default)]
pub struct SubmitResult {
    /// Submitted diffs, bottom of the stack first.
    pub diffs: Vec<SubmittedDiff>,
    /// Commits skipped because they had no changes and no PR.
    pub ignored: Vec<IgnoredDiff>,
    /// True when --dry-run suppressed all writes.
    pub dry_run: bool,
}

/// Execution state for one diff, carried while walking up the stack.
struct Executed {
    plan_idx: usize,
    number: u64,
    pr_url: String,
    head_branch: String,
    head_tip: Oid,
    /// Body on the forge before the metadata pass (for new PRs, the body we
    /// created with).
    current_body: String,
    current_title: String,
    current_base_ref: String,
    comment_id: Option<u64>,
    new_pr: bool,
    what: WhatHappened,
    /// The orig commit message to re-emit, trailers updated.
    commit_msg: String,
}

/// Run a full submit.
pub async fn run_submit(
    ctx: &StackContext<'_>,
    options: &SubmitOptions,
) -> Result<SubmitResult, Error> {
    ctx.git.fetch(&ctx.remote)?;

    let selection = select(ctx, &options.revs, options.stack, options.force)?;
    let plans = classify(ctx, &selection, options.force).await?;

    if options.dry_run {
        return Ok(dry_run_report(&plans));
    }

    let mut executed: Vec<Executed> = Vec::new();
    let mut ignored: Vec<IgnoredDiff> = Vec::new();

    for (idx, plan) in plans.iter().enumerate() {
        match plan.action {
            Action::SkipEmpty => {
                ignored.push(IgnoredDiff {
                    oid: plan.commit.info.oid.clone(),
                    title: plan.commit.parsed.title().to_string(),
                });
            }
            Action::New => {
                let prev = executed.last();
                let exec = execute_new(ctx, options, plan, idx, prev).await?;
                executed.push(exec);
            }
            Action::Update => {
                let prev = executed.last();
                let exec = execute_update(ctx, options, plan, idx, prev)?;
                executed.push(exec);
            }
        }
    }

    push_orig_chain(ctx, &selection.commits, &plans, &executed)?;
    patch_pr_metadata(ctx, options, &plans, &executed).await?;

    let diffs = executed
        .iter()
        .map(|e| SubmittedDiff {
            number: e.number,
            pr_url: e.pr_url.clone(),
            ghnum: plans[e.plan_idx].ghnum,
            title: e.current_title.clone(),
            what: e.what,
        })
        .collect();

    Ok(SubmitResult {
        diffs,
        ignored,
        dry_run: false,
    })
}

fn dry_run_report(plans: &[DiffPlan]) -> SubmitResult {
    let mut result = SubmitResult {
        dry_run: true,
        ..Default::default()
    };
    for plan in plans {
        match plan.action {
            Action::SkipEmpty => result.ignored.push(IgnoredDiff {
                oid: plan.commit.info.oid.clone(),
                title: plan.commit.parsed.title().to_string(),
            }),
            Action::New => result.diffs.push(SubmittedDiff {
                number: 0,
                pr_url: "(new pull request)".to_string(),
                ghnum: plan.ghnum,
                title: plan.commit.parsed.title().to_string(),
                what: WhatHappened::Created,
            }),
            Action::Update => {
                let remote = plan.remote.as_ref().expect("update plan has remote state");
                result.diffs.push(SubmittedDiff {
                    number: remote.pr.number,
                    pr_url: remote.pr.url.clone(),
                    ghnum: plan.ghnum,
                    title: remote.pr.title.clone(),
                    what: WhatHappened::Updated,
                });
            }
        }
    }
    result
}

/// PR body prose derived from the local commit message.
fn pr_prose(commit: &LocalCommit) -> String {
    msg::strip_mentions(commit.parsed.body().trim())
}

/// The freshly-created PR body, navigator to be filled in later.
fn initial_body(ctx: &StackContext<'_>, commit: &LocalCommit) -> String {
    let prose = pr_prose(commit);
    if ctx.mode.is_direct() {
        prose
    } else {
        let mut prose = prose;
        if body::starts_with_bullet(&prose) {
            prose = format!("----\n\n{}", prose);
        }
        format!("{}:\n* (to be filled)\n\n{}", body::STACK_HEADER, prose)
    }
}

fn head_message(options: &SubmitOptions) -> String {
    format!("{}\n\n{}", options.message, POISONED_MARKER)
}

fn base_message(options: &SubmitOptions) -> String {
    format!("{} (base update)\n\n{}", options.message, POISONED_MARKER)
}

/// Create branches and a pull request for a never-submitted diff.
async fn execute_new(
    ctx: &StackContext<'_>,
    options: &SubmitOptions,
    plan: &DiffPlan,
    plan_idx: usize,
    prev: Option<&Executed>,
) -> Result<Executed, Error> {
    let git = ctx.git;
    let commit = &plan.commit;
    let head_branch = plan.branch(BranchKind::Head);

    let (head_tip, pr_base_ref) = if ctx.mode.is_direct() {
        // The head commit is the local commit rebased onto the predecessor's
        // head (or the trunk boundary commit at the bottom of the stack).
        let base_tip = match prev {
            Some(p) => p.head_tip.clone(),
            None => commit.parent.clone(),
        };
        let head = git.commit_tree(
            &commit.info.tree,
            &[&base_tip],
            &head_message(options),
            None,
        )?;
        git.push(&ctx.remote, &[push_spec(&head, &head_branch)], false)?;

        let base_ref = match prev {
            Some(p) => p.head_branch.clone(),
            None => ctx.default_branch.clone(),
        };
        (head, base_ref)
    } else {
        // Synthetic base: a commit carrying the parent's tree, anchored at
        // the merge base with the trunk so the forge can compute one.
        let base_branch = plan.branch(BranchKind::Base);
        let extra_base = git
            .merge_base(&commit.parent, &git.resolve_ref(&ctx.base_ref())?)?
            .ok_or_else(|| {
                Error::Invariant(format!(
                    "no merge base between {} and {}",
                    commit.parent,
                    ctx.base_ref()
                ))
            })?;

        let new_base = git.commit_tree(
            &commit.parent_tree,
            &[&extra_base],
            &base_message(options),
            None,
        )?;
        git.push(&ctx.remote, &[push_spec(&new_base, &base_branch)], false)?;

        // Stack-base-first parent order: the base, then the predecessor's
        // head, so the branch encodes both "the base" and "the change".
        let mut parents: Vec<&Oid> = vec![&new_base];
        if let Some(p) = prev {
            parents.push(&p.head_tip);
        }
        let new_head =
            git.commit_tree(&commit.info.tree, &parents, &head_message(options), None)?;
        git.push(&ctx.remote, &[push_spec(&new_head, &head_branch)], false)?;

        (new_head, base_branch)
    };

    let create = CreatePrRequest {
        head: head_branch.clone(),
        base: pr_base_ref.clone(),
        title: commit.parsed.title().to_string(),
        body: initial_body(ctx, commit),
        draft: options.draft,
    };
    let pr = with_retry("create_pr", || ctx.forge.create_pr(create.clone())).await?;
    info!(number = pr.number, "Opened PR #{}", pr.number);

    let comment_id = if ctx.mode.is_direct() {
        let placeholder = format!("{}:\n* (to be filled)", body::STACK_HEADER);
        let id = with_retry("create_comment", || {
            ctx.forge.create_comment(pr.number, &placeholder)
        })
        .await?;
        Some(id)
    } else {
        None
    };

    // The orig commit message: mention-stripped prose plus fresh trailers.
    // The source id is computed over the prose as stored, so that
    // re-deriving it from the orig commit reproduces the trailer value.
    let stored_prose = msg::strip_mentions(commit.parsed.prose.trim());
    let source_id = msg::source_id(&commit.info.tree, &stored_prose, &commit.parsed.trailers);
    let mut trailers = commit.parsed.user_trailers();
    trailers.push(Trailer::new(msg::SOURCE_ID_KEY, source_id));
    if let Some(id) = comment_id {
        trailers.push(Trailer::new(msg::COMMENT_ID_KEY, id.to_string()));
    }
    let pr_key = if ctx.mode.is_direct() {
        msg::PULL_REQUEST_KEY
    } else {
        msg::PULL_REQUEST_RESOLVED_KEY
    };
    trailers.push(Trailer::new(pr_key, pr.url.clone()));
    let commit_msg = msg::emit(&stored_prose, &trailers);

    Ok(Executed {
        plan_idx,
        number: pr.number,
        pr_url: pr.url.clone(),
        head_branch,
        head_tip,
        current_body: pr.body,
        current_title: pr.title,
        current_base_ref: pr.base_ref,
        comment_id,
        new_pr: true,
        what: WhatHappened::Created,
        commit_msg,
    })
}

/// Synchronize branches for an already-submitted diff.
fn execute_update(
    ctx: &StackContext<'_>,
    options: &SubmitOptions,
    plan: &DiffPlan,
    plan_idx: usize,
    prev: Option<&Executed>,
) -> Result<Executed, Error> {
    let git = ctx.git;
    let commit = &plan.commit;
    let remote = plan.remote.as_ref().expect("update plan has remote state");
    let head_branch = plan.branch(BranchKind::Head);

    let mut pushed = false;
    let mut head_tip = remote.head.clone();

    if ctx.mode.is_direct() {
        let new_base_tip = match prev {
            Some(p) => p.head_tip.clone(),
            None => commit.parent.clone(),
        };
        let needs_base_parent = !git.is_ancestor(&new_base_tip, &remote.head)?;

        if needs_base_parent || remote.head_tree != commit.info.tree {
            let mut parents: Vec<&Oid> = vec![&remote.head];
            if needs_base_parent {
                parents.push(&new_base_tip);
            }
            let new_head =
                git.commit_tree(&commit.info.tree, &parents, &head_message(options), None)?;
            git.push(&ctx.remote, &[push_spec(&new_head, &head_branch)], false)?;
            head_tip = new_head;
            pushed = true;
        }
    } else {
        // Base advance, without force-push: append a merge of the old base
        // tip with the new predecessor state, carrying the parent's tree.
        let mut new_base: Option<Oid> = None;
        let base_changed = match &remote.base {
            Some((_, base_tree)) => *base_tree != commit.parent_tree,
            None => true,
        };

        if base_changed {
            let base_branch = plan.branch(BranchKind::Base);
            let mut parents: Vec<Oid> = Vec::new();
            if let Some((base_tip, _)) = &remote.base {
                parents.push(base_tip.clone());
            }

            let second = match prev {
                Some(p) => Some(p.head_tip.clone()),
                None => git.merge_base(&commit.parent, &git.resolve_ref(&ctx.base_ref())?)?,
            };
            if let Some(second) = second {
                let redundant = match &remote.base {
                    Some((base_tip, _)) => git.is_ancestor(&second, base_tip)?,
                    None => false,
                };
                if !redundant {
                    parents.push(second);
                }
            }

            let parent_refs: Vec<&Oid> = parents.iter().collect();
            let minted = git.commit_tree(
                &commit.parent_tree,
                &parent_refs,
                &base_message(options),
                None,
            )?;
            git.push(&ctx.remote, &[push_spec(&minted, &base_branch)], false)?;
            new_base = Some(minted);
            pushed = true;
        }

        if new_base.is_some() || remote.head_tree != commit.info.tree {
            let mut parents: Vec<&Oid> = vec![&remote.head];
            if let Some(nb) = &new_base {
                parents.push(nb);
            }
            let new_head =
                git.commit_tree(&commit.info.tree, &parents, &head_message(options), None)?;
            git.push(&ctx.remote, &[push_spec(&new_head, &head_branch)], false)?;
            head_tip = new_head;
            pushed = true;
        }
    }

    debug!(number = remote.pr.number, pushed, "Pushing to #{}", remote.pr.number);

    // Refresh the source id on the local message; everything else rides
    // along unchanged so forge-side prose edits survive.
    let mut trailers: Vec<Trailer> = commit
        .parsed
        .trailers
        .iter()
        .filter(|t| t.key != msg::SOURCE_ID_KEY)
        .cloned()
        .collect();
    trailers.push(Trailer::new(msg::SOURCE_ID_KEY, plan.source_id.clone()));
    let commit_msg = msg::emit(&commit.parsed.prose, &trailers);

    let what = if pushed || options.no_skip {
        WhatHappened::Updated
    } else {
        WhatHappened::Skipped
    };

    Ok(Executed {
        plan_idx,
        number: remote.pr.number,
        pr_url: remote.pr.url.clone(),
        head_branch,
        head_tip,
        current_body: remote.pr.body.clone(),
        current_title: remote.pr.title.clone(),
        current_base_ref: remote.pr.base_ref.clone(),
        comment_id: remote.comment_id,
        new_pr: false,
        what,
        commit_msg,
    })
}

/// Rebase the orig chain and force-push orig branches.
///
/// Every commit in the rebase universe whose message or parent changed gets
/// re-minted with original authorship; submitted diffs push their new orig.
/// Finally the local HEAD is advanced so the checkout carries the refreshed
/// trailers.
fn push_orig_chain(
    ctx: &StackContext<'_>,
    commits: &[LocalCommit],
    plans: &[DiffPlan],
    executed: &[Executed],
) -> Result<(), Error> {
    let git = ctx.git;

    let mut exec_by_oid: HashMap<Oid, usize> = HashMap::new();
    for (i, e) in executed.iter().enumerate() {
        exec_by_oid.insert(plans[e.plan_idx].commit.info.oid.clone(), i);
    }

    let mut rebase: HashMap<Oid, Oid> = HashMap::new();

    for commit in commits {
        let exec_idx = exec_by_oid.get(&commit.info.oid).copied();
        let new_parent = rebase.get(&commit.parent).cloned();

        let message_changed = exec_idx
            .map(|i| executed[i].commit_msg != commit.info.message.trim_end())
            .unwrap_or(false);

        // Unchanged message on an unchanged parent needs no re-mint; in
        // particular a no-op rerun leaves orig untouched.
        if new_parent.is_none() && !message_changed {
            continue;
        }

        let parent = new_parent.unwrap_or_else(|| commit.parent.clone());
        let message = match exec_idx {
            Some(i) => executed[i].commit_msg.clone(),
            None => commit.info.message.clone(),
        };

        let new_orig = git.commit_tree(
            &commit.info.tree,
            &[&parent],
            &message,
            Some(&commit.info.author),
        )?;
        rebase.insert(commit.info.oid.clone(), new_orig.clone());

        if let Some(i) = exec_idx {
            let orig_branch = plans[executed[i].plan_idx].branch(BranchKind::Orig);
            // orig is the one branch where force is allowed: it mirrors the
            // user's (rewritten) checkout rather than review history.
            git.push(&ctx.remote, &[push_spec(&new_orig, &orig_branch)], true)?;
        }
    }

    let head = git.head_oid()?;
    if let Some(new_head) = rebase.get(&head) {
        git.reset_soft(new_head)?;
    }

    Ok(())
}

/// Patch pull request titles, bodies and base refs to reflect the stack.
///
/// Runs after all branch writes so every PR number is known. A run where
/// every diff was skipped performs no writes at all (idempotence).
async fn patch_pr_metadata(
    ctx: &StackContext<'_>,
    options: &SubmitOptions,
    plans: &[DiffPlan],
    executed: &[Executed],
) -> Result<(), Error> {
    if executed.is_empty() {
        return Ok(());
    }

    let all_skipped = executed.iter().all(|e| e.what == WhatHappened::Skipped);
    if all_skipped && !options.no_skip {
        return Ok(());
    }

    // Top of stack first.
    let stack_numbers: Vec<u64> = executed.iter().rev().map(|e| e.number).collect();

    let mut prev_head_branch: Option<&str> = None;
    for exec in executed {
        let plan = &plans[exec.plan_idx];
        let commit = &plan.commit;

        let mut request = UpdatePrRequest {
            number: exec.number,
            ..Default::default()
        };

        if ctx.mode.is_direct() {
            if options.update_fields {
                let title = commit.parsed.title().to_string();
                if title != exec.current_title {
                    request.title = Some(title);
                }
                let prose = pr_prose(commit);
                if prose != exec.current_body {
                    request.body = Some(prose);
                }
            }

            // Retarget when the predecessor changed (reorder, insert, land).
            let desired_base = prev_head_branch.unwrap_or(&ctx.default_branch);
            if desired_base != exec.current_base_ref {
                request.base = Some(desired_base.to_string());
            }

            if let Some(comment_id) = exec.comment_id {
                let navigator = body::render_navigator(&stack_numbers, exec.number);
                with_retry("update_comment", || {
                    ctx.forge.update_comment(comment_id, &navigator)
                })
                .await?;
            }
        } else {
            let desired_body = if options.update_fields && !exec.new_pr {
                body::render(&stack_numbers, exec.number, &pr_prose(commit))
            } else {
                body::replace_navigator(&exec.current_body, &stack_numbers, exec.number)
            };
            if desired_body != exec.current_body {
                request.body = Some(desired_body);
            }

            if options.update_fields && !exec.new_pr {
                let title = commit.parsed.title().to_string();
                if title != exec.current_title {
                    request.title = Some(title);
                }
            }
        }

        if !request.is_noop() {
            info!(number = exec.number, "# Updating {}", exec.pr_url);
            let req = request.clone();
            with_retry("update_pr", || ctx.forge.update_pr(req.clone())).await?;
        }

        prev_head_branch = Some(&exec.head_branch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_stacky() {
        let options = SubmitOptions::default();
        assert!(options.stack);
        assert!(!options.force);
        assert_eq!(options.message, "Update");
    }

    #[test]
    fn what_happened_display() {
        assert_eq!(WhatHappened::Created.to_string(), "Created");
        assert_eq!(WhatHappened::Updated.to_string(), "Updated");
        assert_eq!(WhatHappened::Skipped.to_string(), "Skipped");
    }

    #[test]
    fn synthetic_messages_are_poisoned() {
        let options = SubmitOptions::default();
        assert!(head_message(&options).contains(POISONED_MARKER));
        assert!(base_message(&options).contains("(base update)"));
        assert!(base_message(&options).contains(POISONED_MARKER));
    }
}
