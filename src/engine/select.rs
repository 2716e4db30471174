//! engine::select
//!
//! The stack selector: compute which local commits form the stack.
//!
//! Selection is a pure read of repository state. It produces the full chain
//! of commits between the merge base and HEAD (the "rebase universe"), and
//! marks the subset actually being submitted. Submitting a prefix still
//! rebases the suffix so the local checkout stays coherent.

use std::collections::HashSet;

use crate::core::types::{Oid, TreeOid};
use crate::git::{CommitInfo, Git};
use crate::msg::{self, Message};

use super::{Error, StackContext, POISONED_MARKER};

/// One commit in the local stack.
#[derive(Debug, Clone)]
pub struct LocalCommit {
    /// Raw commit information from Git.
    pub info: CommitInfo,
    /// The message decomposed into prose and trailers.
    pub parsed: Message,
    /// The single parent commit.
    pub parent: Oid,
    /// The parent's tree, for zero-delta and base computations.
    pub parent_tree: TreeOid,
    /// Whether this commit is in the submit set (as opposed to only being
    /// rebased to track changes below it).
    pub submit: bool,
}

impl LocalCommit {
    /// Zero tree delta against the parent.
    pub fn is_empty(&self) -> bool {
        self.info.tree == self.parent_tree
    }
}

/// The selected stack.
#[derive(Debug)]
pub struct Selection {
    /// Commits from merge base to HEAD, oldest first.
    pub commits: Vec<LocalCommit>,
    /// Tip of the remote base branch.
    pub base_oid: Oid,
}

/// Compute the stack to submit.
///
/// `revs` restricts the submit set; empty means HEAD. With `stack` semantics
/// a rev selects everything reachable from it (standard rev-list behavior);
/// without, each rev selects exactly one commit.
pub fn select(
    ctx: &StackContext<'_>,
    revs: &[String],
    stack: bool,
    force: bool,
) -> Result<Selection, Error> {
    let git = ctx.git;

    let base_ref = ctx.base_ref();
    let base_oid = git.resolve_ref(&base_ref)?;
    let head = git.head_oid()?;

    // The rebase universe: everything between the remote base and HEAD.
    let universe = git.rev_list(&head, Some(&base_oid))?;

    // Resolve the submit set.
    let submit_set = resolve_submit_set(git, &universe, &base_oid, revs, stack)?;

    let mut commits = Vec::with_capacity(universe.len());
    for oid in &universe {
        let info = git.commit_info(oid)?;

        if info.parents.len() != 1 {
            return Err(Error::MergeCommit {
                oid: oid.clone(),
                count: info.parents.len(),
            });
        }

        if info.message.contains(POISONED_MARKER) {
            return Err(Error::PoisonedCommit { oid: oid.clone() });
        }

        let parent = info.parents[0].clone();
        let parent_tree = git.tree_of(&parent)?;
        let parsed = msg::parse(&info.message);

        commits.push(LocalCommit {
            submit: submit_set.contains(oid),
            info,
            parsed,
            parent,
            parent_tree,
        });
    }

    let submit_count = commits.iter().filter(|c| c.submit).count();
    if submit_count == 0 {
        return Err(Error::EmptyStack);
    }
    if submit_count > ctx.throttle && !force {
        return Err(Error::StackTooLong {
            len: submit_count,
            limit: ctx.throttle,
        });
    }

    Ok(Selection { commits, base_oid })
}

fn resolve_submit_set(
    git: &Git,
    universe: &[Oid],
    base_oid: &Oid,
    revs: &[String],
    stack: bool,
) -> Result<HashSet<Oid>, Error> {
    let universe_set: HashSet<&Oid> = universe.iter().collect();

    if revs.is_empty() {
        // Everything between base and HEAD, regardless of stack flag: a
        // single commit's reachable set is the same chain either way.
        return Ok(universe.iter().cloned().collect());
    }

    let mut submit = HashSet::new();
    for rev in revs {
        let oid = git.resolve_ref(rev)?;
        if !universe_set.contains(&oid) {
            // Not between the base and HEAD; nothing we can submit.
            return Err(Error::EmptyStack);
        }
        if stack {
            for reachable in git.rev_list(&oid, Some(base_oid))? {
                submit.insert(reachable);
            }
        } else {
            submit.insert(oid);
        }
    }
    Ok(submit)
}
