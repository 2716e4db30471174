//! cli::commands::unlink
//!
//! Strip ghstack trailers from local commits.

use std::path::PathBuf;

use anyhow::Result;

use crate::engine;
use crate::ui::output;

use super::Session;

/// Handle `ghstack unlink [commits...]`.
///
/// Unlink works entirely locally: no forge client is needed, and no token
/// has to be configured.
pub fn unlink(cwd: Option<PathBuf>, quiet: bool, commits: &[String]) -> Result<()> {
    let session = Session::open(cwd, quiet)?;

    // Without a forge call the stack base falls back to the remote HEAD
    // symref if configured, else to the conventional default.
    let remote = session.config.remote_name.clone();
    let base_branch = default_branch_guess(&session)?;

    let result = engine::run_unlink(&session.git, &remote, &base_branch, commits)?;

    output::print(
        format!(
            "Unlinked {} commit(s).  To undo, run: git reset --soft {}",
            result.unlinked, result.old_head
        ),
        session.verbosity,
    );

    Ok(())
}

/// Best local guess at the upstream default branch: the first of `master`
/// and `main` with a tracking ref.
fn default_branch_guess(session: &Session) -> Result<String> {
    let remote = &session.config.remote_name;

    for candidate in ["master", "main"] {
        let refname = session.git.remote_ref(remote, candidate);
        if session.git.try_resolve_ref(&refname)?.is_some() {
            return Ok(candidate.to_string());
        }
    }

    anyhow::bail!(
        "cannot determine the default branch of remote '{}'; fetch first",
        remote
    )
}
