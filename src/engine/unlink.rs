//! engine::unlink
//!
//! The unlink engine: strip ghstack trailers from local commits so the next
//! submit treats them as new diffs.
//!
//! No remote writes. The selected commits are rewritten through the codec
//! (dropping `ghstack-source-id`, the PR trailer and the comment id), the
//! chain above them is rebased, and HEAD is advanced softly. Rewriting
//! history requires a clean working tree.

use std::collections::HashSet;

use tracing::info;

use crate::core::types::Oid;
use crate::git::Git;
use crate::msg;

use super::Error;

/// The outcome of an unlink run.
#[derive(Debug, Clone)]
pub struct UnlinkResult {
    /// New HEAD after the rewrite.
    pub new_head: Oid,
    /// The old HEAD, for `git reset --soft` undo instructions.
    pub old_head: Oid,
    /// How many commits lost their trailers.
    pub unlinked: usize,
}

/// Unlink commits from their pull requests.
///
/// `commits` restricts the rewrite; empty unlinks the entire stack. All
/// named commits must lie on the current stack (between the remote base and
/// HEAD).
pub fn run_unlink(
    git: &Git,
    remote: &str,
    base_branch: &str,
    commits: &[String],
) -> Result<UnlinkResult, Error> {
    git.require_clean_worktree()?;

    let base_ref = git.remote_ref(remote, base_branch);
    let base = git.resolve_ref(&base_ref)?;
    let old_head = git.head_oid()?;

    let stack = git.rev_list(&old_head, Some(&base))?;
    if stack.is_empty() {
        return Err(Error::EmptyStack);
    }
    let stack_set: HashSet<&Oid> = stack.iter().collect();

    let requested: Option<HashSet<Oid>> = if commits.is_empty() {
        None
    } else {
        let mut set = HashSet::new();
        let mut outside = Vec::new();
        for rev in commits {
            let oid = git.resolve_ref(rev)?;
            if !stack_set.contains(&oid) {
                outside.push(oid.to_string());
            }
            set.insert(oid);
        }
        if !outside.is_empty() {
            return Err(Error::UnlinkOutsideStack {
                commits: outside.join("\n"),
            });
        }
        Some(set)
    };

    // Walk the stack bottom up; start rewriting at the first commit that
    // needs it and carry the new parent from there.
    let mut head = base.clone();
    let mut rewriting = false;
    let mut unlinked = 0;

    for oid in &stack {
        let should_unlink = requested.as_ref().map_or(true, |set| set.contains(oid));

        if !rewriting && !should_unlink {
            head = oid.clone();
            continue;
        }
        rewriting = true;

        let info = git.commit_info(oid)?;
        let message = if should_unlink {
            unlinked += 1;
            let parsed = msg::parse(&info.message);
            msg::emit(&parsed.prose, &parsed.user_trailers())
        } else {
            info.message.clone()
        };

        head = git.commit_tree(&info.tree, &[&head], &message, Some(&info.author))?;
    }

    git.reset_soft(&head)?;
    info!(
        "Diffs successfully unlinked!  To undo, run: git reset --soft {}",
        old_head
    );

    Ok(UnlinkResult {
        new_head: head,
        old_head,
        unlinked,
    })
}
