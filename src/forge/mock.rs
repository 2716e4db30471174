//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge stores PRs in memory, records every mutating operation so
//! tests can assert on write traffic (the idempotence invariant is "no forge
//! writes on a second run"), and allows configuring failure injection for
//! error-path tests.
//!
//! # Example
//!
//! ```
//! use ghstack::forge::mock::MockForge;
//! use ghstack::forge::{CreatePrRequest, Forge, PrState};
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new("owner", "repo").with_next_pr_number(500);
//!
//! let pr = forge.create_pr(CreatePrRequest {
//!     head: "gh/alice/1/head".to_string(),
//!     base: "gh/alice/1/base".to_string(),
//!     title: "Add feature".to_string(),
//!     body: String::new(),
//!     draft: false,
//! }).await.unwrap();
//!
//! assert_eq!(pr.number, 500);
//! assert_eq!(pr.state, PrState::Open);
//! # });
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::traits::{
    CreatePrRequest, Forge, ForgeError, PrState, PullRequest, RepoInfo, UpdatePrRequest,
};

/// Recorded mutating operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    CreatePr { head: String, base: String },
    UpdatePr { number: u64 },
    ClosePr { number: u64 },
    DeleteBranch { name: String },
    CreateComment { pr_number: u64 },
    UpdateComment { comment_id: u64 },
}

/// Which operation should fail, and how often.
#[derive(Debug, Clone)]
pub struct FailOn {
    /// Operation name: "get_pr", "create_pr", "update_pr", "close_pr",
    /// "delete_branch", "get_repo", "list_open_prs".
    pub operation: &'static str,
    /// The error to return.
    pub error: ForgeError,
    /// How many times to fail before succeeding (`None` = always).
    pub times: Option<u32>,
}

#[derive(Debug)]
struct MockForgeInner {
    repo: RepoInfo,
    prs: HashMap<u64, PullRequest>,
    comments: HashMap<u64, String>,
    next_pr_number: u64,
    next_comment_id: u64,
    operations: Vec<MockOperation>,
    fail_on: Option<FailOn>,
}

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>`; clones share state.
#[derive(Debug, Clone)]
pub struct MockForge {
    inner: Arc<Mutex<MockForgeInner>>,
}

impl MockForge {
    /// Create a new empty mock forge for an `owner/repo` with default branch
    /// `master`.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        let owner = owner.into();
        let repo = repo.into();
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner {
                repo: RepoInfo {
                    id: format!("R_{}_{}", owner, repo),
                    owner,
                    name: repo,
                    default_branch: "master".to_string(),
                    is_fork: false,
                },
                prs: HashMap::new(),
                comments: HashMap::new(),
                next_pr_number: 1,
                next_comment_id: 1,
                operations: Vec::new(),
                fail_on: None,
            })),
        }
    }

    /// Set the number the next created PR receives.
    pub fn with_next_pr_number(self, number: u64) -> Self {
        self.inner.lock().unwrap().next_pr_number = number;
        self
    }

    /// Set the default branch reported by `get_repo`.
    pub fn with_default_branch(self, branch: impl Into<String>) -> Self {
        self.inner.lock().unwrap().repo.default_branch = branch.into();
        self
    }

    /// Mark the repository as a fork.
    pub fn as_fork(self) -> Self {
        self.inner.lock().unwrap().repo.is_fork = true;
        self
    }

    /// Configure an operation to fail.
    pub fn fail_on(&self, fail: FailOn) {
        self.inner.lock().unwrap().fail_on = Some(fail);
    }

    /// All mutating operations recorded so far.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Drop the recorded operations (e.g. between two submit runs).
    pub fn clear_operations(&self) {
        self.inner.lock().unwrap().operations.clear();
    }

    /// Read back a comment body.
    pub fn comment_body(&self, comment_id: u64) -> Option<String> {
        self.inner.lock().unwrap().comments.get(&comment_id).cloned()
    }

    /// Directly fetch a PR's current state for assertions.
    pub fn pr(&self, number: u64) -> Option<PullRequest> {
        self.inner.lock().unwrap().prs.get(&number).cloned()
    }

    fn check_fail(&self, operation: &'static str) -> Result<(), ForgeError> {
        let mut inner = self.inner.lock().unwrap();

        let mut exhausted = false;
        let mut result = Ok(());
        if let Some(fail) = &mut inner.fail_on {
            if fail.operation == operation {
                match &mut fail.times {
                    None => result = Err(fail.error.clone()),
                    Some(0) => exhausted = true,
                    Some(n) => {
                        *n -= 1;
                        result = Err(fail.error.clone());
                    }
                }
            }
        }
        if exhausted {
            inner.fail_on = None;
        }
        result
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_repo(&self) -> Result<RepoInfo, ForgeError> {
        self.check_fail("get_repo")?;
        Ok(self.inner.lock().unwrap().repo.clone())
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequest, ForgeError> {
        self.check_fail("get_pr")?;
        self.inner
            .lock()
            .unwrap()
            .prs
            .get(&number)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("PR #{}", number)))
    }

    async fn list_open_prs(&self) -> Result<Vec<PullRequest>, ForgeError> {
        self.check_fail("list_open_prs")?;
        let inner = self.inner.lock().unwrap();
        let mut open: Vec<PullRequest> = inner
            .prs
            .values()
            .filter(|pr| pr.state.is_open())
            .cloned()
            .collect();
        open.sort_by_key(|pr| pr.number);
        Ok(open)
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        self.check_fail("create_pr")?;
        let mut inner = self.inner.lock().unwrap();

        let number = inner.next_pr_number;
        inner.next_pr_number += 1;

        let url = format!(
            "https://github.com/{}/{}/pull/{}",
            inner.repo.owner, inner.repo.name, number
        );
        let pr = PullRequest {
            number,
            url,
            state: PrState::Open,
            head_ref: request.head.clone(),
            base_ref: request.base.clone(),
            title: request.title,
            body: request.body,
        };

        inner.operations.push(MockOperation::CreatePr {
            head: request.head,
            base: request.base,
        });
        inner.prs.insert(number, pr.clone());
        Ok(pr)
    }

    async fn update_pr(&self, request: UpdatePrRequest) -> Result<PullRequest, ForgeError> {
        self.check_fail("update_pr")?;
        let mut inner = self.inner.lock().unwrap();

        inner.operations.push(MockOperation::UpdatePr {
            number: request.number,
        });

        let pr = inner
            .prs
            .get_mut(&request.number)
            .ok_or_else(|| ForgeError::NotFound(format!("PR #{}", request.number)))?;

        if let Some(title) = request.title {
            pr.title = title;
        }
        if let Some(body) = request.body {
            pr.body = body;
        }
        if let Some(base) = request.base {
            pr.base_ref = base;
        }
        Ok(pr.clone())
    }

    async fn close_pr(&self, number: u64) -> Result<(), ForgeError> {
        self.check_fail("close_pr")?;
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::ClosePr { number });

        let pr = inner
            .prs
            .get_mut(&number)
            .ok_or_else(|| ForgeError::NotFound(format!("PR #{}", number)))?;
        if pr.state.is_open() {
            pr.state = PrState::Closed;
        }
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<(), ForgeError> {
        self.check_fail("delete_branch")?;
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::DeleteBranch {
            name: name.to_string(),
        });
        Ok(())
    }

    async fn create_comment(&self, pr_number: u64, body: &str) -> Result<u64, ForgeError> {
        self.check_fail("create_comment")?;
        let mut inner = self.inner.lock().unwrap();

        let id = inner.next_comment_id;
        inner.next_comment_id += 1;
        inner.comments.insert(id, body.to_string());
        inner
            .operations
            .push(MockOperation::CreateComment { pr_number });
        Ok(id)
    }

    async fn update_comment(&self, comment_id: u64, body: &str) -> Result<(), ForgeError> {
        self.check_fail("update_comment")?;
        let mut inner = self.inner.lock().unwrap();

        if !inner.comments.contains_key(&comment_id) {
            return Err(ForgeError::NotFound(format!("comment {}", comment_id)));
        }
        inner.comments.insert(comment_id, body.to_string());
        inner
            .operations
            .push(MockOperation::UpdateComment { comment_id });
        Ok(())
    }
}
