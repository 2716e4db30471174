//! git
//!
//! Single doorway to all Git operations.

mod interface;

pub use interface::{CommitAuthor, CommitInfo, Git, GitError, RefEntry};

use crate::core::types::Oid;

/// Format a push refspec `sha:refs/heads/<branch>`.
pub fn push_spec(commit: &Oid, branch: &str) -> String {
    format!("{}:refs/heads/{}", commit, branch)
}

/// Parse a remote URL on the given host into `(owner, repo)`.
///
/// Handles both HTTPS and SSH shapes:
/// - `https://github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git`
///
/// Returns `None` for URLs on other hosts.
pub fn parse_remote_url(url: &str, host: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix(&format!("https://{}/", host))
        .or_else(|| url.strip_prefix(&format!("git@{}:", host)))
        .or_else(|| url.strip_prefix(&format!("ssh://git@{}/", host)))?;

    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let (owner, repo) = rest.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_https_and_ssh_remotes() {
        assert_eq!(
            parse_remote_url("https://github.com/octo/spoon.git", "github.com"),
            Some(("octo".into(), "spoon".into()))
        );
        assert_eq!(
            parse_remote_url("git@github.com:octo/spoon.git", "github.com"),
            Some(("octo".into(), "spoon".into()))
        );
        assert_eq!(
            parse_remote_url("ssh://git@github.com/octo/spoon", "github.com"),
            Some(("octo".into(), "spoon".into()))
        );
    }

    #[test]
    fn rejects_foreign_hosts_and_junk() {
        assert_eq!(parse_remote_url("https://gitlab.com/o/r.git", "github.com"), None);
        assert_eq!(parse_remote_url("https://github.com/justowner", "github.com"), None);
        assert_eq!(parse_remote_url("https://github.com/a/b/c", "github.com"), None);
    }
}
