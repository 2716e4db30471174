//! Shared fixtures for integration tests.
//!
//! Tests drive the engine against a real local repository with a bare
//! directory standing in for the remote, and a `MockForge` standing in for
//! GitHub. Pushes and fetches go through real `git`.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use ghstack::engine::{Mode, StackContext};
use ghstack::forge::mock::MockForge;
use ghstack::git::Git;

/// Run a git command in a directory, asserting success.
pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

/// Run a git command that may fail, returning stdout on success.
pub fn try_git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to spawn git");
    if output.status.success() {
        Some(String::from_utf8(output.stdout).unwrap().trim().to_string())
    } else {
        None
    }
}

/// A local repository with a bare origin and a mock forge.
pub struct StackRepo {
    pub local: TempDir,
    pub origin: TempDir,
    pub forge: MockForge,
}

impl StackRepo {
    /// Repository with one pushed commit on `master`, forge numbering
    /// starting at PR #500.
    pub fn new() -> Self {
        let origin = TempDir::new().expect("failed to create origin temp dir");
        run_git(origin.path(), &["init", "--bare", "-b", "master"]);

        let local = TempDir::new().expect("failed to create local temp dir");
        run_git(local.path(), &["init", "-b", "master"]);
        run_git(local.path(), &["config", "user.email", "test@example.com"]);
        run_git(local.path(), &["config", "user.name", "Test User"]);
        run_git(
            local.path(),
            &["remote", "add", "origin", origin.path().to_str().unwrap()],
        );

        std::fs::write(local.path().join("README.md"), "# Test Repo\n").unwrap();
        run_git(local.path(), &["add", "README.md"]);
        run_git(local.path(), &["commit", "-m", "Initial commit"]);
        run_git(local.path(), &["push", "origin", "master"]);

        let forge = MockForge::new("pytorch", "pytorch").with_next_pr_number(500);

        Self {
            local,
            origin,
            forge,
        }
    }

    /// Open the Git doorway on the local repository.
    pub fn git(&self) -> Git {
        Git::open(self.local.path()).expect("failed to open local repo")
    }

    /// Open the Git doorway on the origin repository.
    pub fn origin_git(&self) -> Git {
        Git::open(self.origin.path()).expect("failed to open origin repo")
    }

    /// Write a file and commit it.
    pub fn commit(&self, file: &str, content: &str, message: &str) {
        std::fs::write(self.local.path().join(file), content).unwrap();
        run_git(self.local.path(), &["add", file]);
        run_git(self.local.path(), &["commit", "-m", message]);
    }

    /// Amend the HEAD commit with new file content, keeping the message.
    pub fn amend(&self, file: &str, content: &str) {
        std::fs::write(self.local.path().join(file), content).unwrap();
        run_git(self.local.path(), &["add", file]);
        run_git(self.local.path(), &["commit", "--amend", "--no-edit"]);
    }

    /// HEAD commit id.
    pub fn head(&self) -> String {
        run_git(self.local.path(), &["rev-parse", "HEAD"])
    }

    /// Full HEAD commit message.
    pub fn head_message(&self) -> String {
        run_git(self.local.path(), &["log", "-1", "--format=%B"])
    }

    /// Resolve a branch tip on the origin, if it exists.
    pub fn origin_branch(&self, branch: &str) -> Option<String> {
        try_git(
            self.origin.path(),
            &["rev-parse", &format!("refs/heads/{}", branch)],
        )
    }

    /// Tree id of a commit on the origin.
    pub fn origin_tree(&self, commitish: &str) -> String {
        run_git(
            self.origin.path(),
            &["rev-parse", &format!("{}^{{tree}}", commitish)],
        )
    }

    /// Count commits on an origin branch.
    pub fn origin_commit_count(&self, branch: &str) -> usize {
        run_git(
            self.origin.path(),
            &["rev-list", "--count", &format!("refs/heads/{}", branch)],
        )
        .parse()
        .unwrap()
    }

    /// Count origin commits reachable from `tip` but not from `exclude`.
    pub fn origin_range_count(&self, exclude: &str, tip: &str) -> usize {
        run_git(
            self.origin.path(),
            &[
                "rev-list",
                "--count",
                &format!("refs/heads/{}..refs/heads/{}", exclude, tip),
            ],
        )
        .parse()
        .unwrap()
    }

    /// Delete branches on the origin (simulating forge-side deletion).
    pub fn delete_origin_branches(&self, branches: &[&str]) {
        let mut args = vec!["push", "origin", "--delete"];
        args.extend(branches);
        run_git(self.local.path(), &args);
    }
}

/// Build an engine context over the fixture.
pub fn stack_context<'a>(git: &'a Git, forge: &'a MockForge, mode: Mode) -> StackContext<'a> {
    stack_context_on(git, forge, mode, "master")
}

/// Build an engine context targeting a non-default base branch.
pub fn stack_context_on<'a>(
    git: &'a Git,
    forge: &'a MockForge,
    mode: Mode,
    base: &str,
) -> StackContext<'a> {
    StackContext {
        git,
        forge,
        username: "ezyang".to_string(),
        remote: "origin".to_string(),
        github_url: "github.com".to_string(),
        owner: "pytorch".to_string(),
        repo: "pytorch".to_string(),
        default_branch: base.to_string(),
        mode,
        throttle: 8,
    }
}
