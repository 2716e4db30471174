//! forge
//!
//! Abstraction for the remote hosting service.
//!
//! - [`traits`] - The `Forge` trait and supporting request/response types
//! - [`github`] - GitHub implementation over the REST API
//! - [`mock`] - Deterministic in-memory forge for tests
//! - [`retry`] - Bounded exponential backoff for transient failures

pub mod github;
pub mod mock;
pub mod retry;
pub mod traits;

pub use retry::with_retry;
pub use traits::{
    CreatePrRequest, Forge, ForgeError, PrState, PullRequest, RepoInfo, UpdatePrRequest,
};
