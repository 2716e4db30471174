//! forge::traits
//!
//! Forge trait definition for interacting with the remote hosting service.
//!
//! # Design
//!
//! The `Forge` trait is async because forge operations involve network I/O.
//! All methods return `Result` to handle API errors gracefully. The forge is
//! invoked only after local classification has fully succeeded; a forge
//! failure never compromises local correctness.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from forge operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ForgeError {
    /// Whether retrying the operation may succeed.
    ///
    /// Rate limits, connection failures and server-side errors are
    /// transient; everything else is permanent and surfaced immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ForgeError::RateLimited | ForgeError::NetworkError(_) => true,
            ForgeError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Repository metadata.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Opaque forge-side id
    pub id: String,
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub name: String,
    /// Default branch name (usually "main" or "master")
    pub default_branch: String,
    /// Whether this repository is a fork
    pub is_fork: bool,
}

/// PR state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    /// PR is open and awaiting review/merge
    Open,
    /// PR is closed without being merged
    Closed,
    /// PR has been merged
    Merged,
}

impl PrState {
    /// Open, as opposed to closed or merged.
    pub fn is_open(&self) -> bool {
        matches!(self, PrState::Open)
    }
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// Pull request information returned from the forge.
#[derive(Debug, Clone)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// Web URL for viewing
    pub url: String,
    /// PR state
    pub state: PrState,
    /// Head branch name
    pub head_ref: String,
    /// Base branch name
    pub base_ref: String,
    /// PR title
    pub title: String,
    /// PR body
    pub body: String,
}

/// Request to create a pull request.
#[derive(Debug, Clone)]
pub struct CreatePrRequest {
    /// Head branch name (the branch with changes)
    pub head: String,
    /// Base branch name (the branch to merge into)
    pub base: String,
    /// PR title
    pub title: String,
    /// PR body
    pub body: String,
    /// Create as draft
    pub draft: bool,
}

/// Request to update a pull request. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdatePrRequest {
    /// PR number
    pub number: u64,
    /// New title
    pub title: Option<String>,
    /// New body
    pub body: Option<String>,
    /// New base branch
    pub base: Option<String>,
}

impl UpdatePrRequest {
    /// Whether the request changes anything at all.
    pub fn is_noop(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.base.is_none()
    }
}

/// The Forge trait for interacting with the remote hosting service.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Get the forge name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Get metadata for the repository this forge is bound to.
    async fn get_repo(&self) -> Result<RepoInfo, ForgeError>;

    /// Get a pull request by number.
    async fn get_pr(&self, number: u64) -> Result<PullRequest, ForgeError>;

    /// List open pull requests.
    ///
    /// Used to find which gh numbers are currently held by open PRs so that
    /// allocation can skip them.
    async fn list_open_prs(&self) -> Result<Vec<PullRequest>, ForgeError>;

    /// Create a new pull request.
    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError>;

    /// Update an existing pull request.
    async fn update_pr(&self, request: UpdatePrRequest) -> Result<PullRequest, ForgeError>;

    /// Close a pull request without merging.
    async fn close_pr(&self, number: u64) -> Result<(), ForgeError>;

    /// Delete a branch on the forge.
    async fn delete_branch(&self, name: &str) -> Result<(), ForgeError>;

    /// Post an issue comment on a pull request, returning the comment id.
    ///
    /// Direct mode keeps the stack listing in a comment so a squash-merged
    /// commit message does not inherit it.
    async fn create_comment(&self, pr_number: u64, body: &str) -> Result<u64, ForgeError>;

    /// Update an issue comment.
    async fn update_comment(&self, comment_id: u64, body: &str) -> Result<(), ForgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pr_state_display() {
        assert_eq!(format!("{}", PrState::Open), "open");
        assert_eq!(format!("{}", PrState::Closed), "closed");
        assert_eq!(format!("{}", PrState::Merged), "merged");
    }

    #[test]
    fn transient_classification() {
        assert!(ForgeError::RateLimited.is_transient());
        assert!(ForgeError::NetworkError("reset".into()).is_transient());
        assert!(ForgeError::ApiError {
            status: 502,
            message: "bad gateway".into()
        }
        .is_transient());
        assert!(!ForgeError::NotFound("pr".into()).is_transient());
        assert!(!ForgeError::ApiError {
            status: 422,
            message: "validation".into()
        }
        .is_transient());
        assert!(!ForgeError::AuthFailed("expired".into()).is_transient());
    }

    #[test]
    fn update_request_noop_detection() {
        assert!(UpdatePrRequest {
            number: 1,
            ..Default::default()
        }
        .is_noop());
        assert!(!UpdatePrRequest {
            number: 1,
            title: Some("t".into()),
            ..Default::default()
        }
        .is_noop());
    }
}
