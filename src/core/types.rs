//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Oid`] - Git commit object identifier (SHA)
//! - [`TreeOid`] - Git tree object identifier
//! - [`GhNumber`] - Per-user stack slot number, sticky for the life of a diff
//! - [`PullRequestRef`] - `(owner, repo, number)` identity of a pull request
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values cannot
//! be represented, preventing entire classes of bugs downstream in the
//! submission engine.
//!
//! # Examples
//!
//! ```
//! use ghstack::core::types::{Oid, GhNumber, PullRequestRef};
//!
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! assert_eq!(oid.short(7), "abc123d");
//!
//! let ghnum = GhNumber::new(3);
//! assert_eq!(ghnum.to_string(), "3");
//!
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid pull request url: {0}")]
    InvalidPrUrl(String),
}

fn validate_hex_oid(oid: &str) -> Result<(), TypeError> {
    // SHA-1 is 40 hex chars, SHA-256 is 64
    if oid.len() != 40 && oid.len() != 64 {
        return Err(TypeError::InvalidOid(format!(
            "expected 40 or 64 hex characters, got {}",
            oid.len()
        )));
    }
    if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TypeError::InvalidOid(
            "object id must be hexadecimal".into(),
        ));
    }
    Ok(())
}

/// A Git commit object identifier.
///
/// OIDs are normalized to lowercase for consistency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id, normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        validate_hex_oid(&oid)?;
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    ///
    /// Returns the first `len` characters, or the full OID if `len` exceeds
    /// its length.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Git tree object identifier.
///
/// Kept distinct from [`Oid`] because the submission engine compares trees
/// and commits in close proximity, and mixing them up is exactly the kind of
/// bug that corrupts a pull request history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreeOid(String);

impl TreeOid {
    /// Create a new validated tree id, normalized to lowercase.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        validate_hex_oid(&oid)?;
        Ok(Self(oid))
    }

    /// Get the tree id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TreeOid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<TreeOid> for String {
    fn from(oid: TreeOid) -> Self {
        oid.0
    }
}

impl AsRef<str> for TreeOid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TreeOid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A per-user stack slot number.
///
/// Allocated when a diff is first submitted and sticky from then on: the
/// number follows the diff across amendments, reorders and rebases, and is
/// never reused after its pull request closes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GhNumber(u64);

impl GhNumber {
    /// Wrap a raw number.
    pub fn new(n: u64) -> Self {
        Self(n)
    }

    /// The raw number.
    pub fn get(&self) -> u64 {
        self.0
    }

    /// The next number in sequence.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for GhNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a pull request on the forge.
///
/// # Example
///
/// ```
/// use ghstack::core::types::PullRequestRef;
///
/// let pr = PullRequestRef::new("pytorch", "pytorch", 500);
/// assert_eq!(
///     pr.url("github.com"),
///     "https://github.com/pytorch/pytorch/pull/500"
/// );
///
/// let parsed = PullRequestRef::parse_url(
///     "https://github.com/pytorch/pytorch/pull/500",
///     "github.com",
/// ).unwrap();
/// assert_eq!(parsed, pr);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestRef {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Pull request number
    pub number: u64,
}

impl PullRequestRef {
    /// Create a pull request reference.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    /// Canonical web URL for this pull request.
    pub fn url(&self, github_url: &str) -> String {
        format!(
            "https://{}/{}/{}/pull/{}",
            github_url, self.owner, self.repo, self.number
        )
    }

    /// Parse a canonical pull request URL.
    ///
    /// Only URLs on the given host are accepted; anything else returns
    /// `TypeError::InvalidPrUrl`.
    pub fn parse_url(url: &str, github_url: &str) -> Result<Self, TypeError> {
        let err = || TypeError::InvalidPrUrl(url.to_string());

        let rest = url
            .strip_prefix("https://")
            .and_then(|r| r.strip_prefix(github_url))
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(err)?;

        let mut parts = rest.split('/');
        let owner = parts.next().filter(|s| !s.is_empty()).ok_or_else(err)?;
        let repo = parts.next().filter(|s| !s.is_empty()).ok_or_else(err)?;
        if parts.next() != Some("pull") {
            return Err(err());
        }
        let number: u64 = parts
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(err)?;
        if parts.next().is_some() {
            return Err(err());
        }

        Ok(Self::new(owner, repo, number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_normalizes_to_lowercase() {
        let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
        assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
    }

    #[test]
    fn oid_rejects_bad_length() {
        assert!(Oid::new("abc123").is_err());
        assert!(Oid::new("").is_err());
    }

    #[test]
    fn oid_rejects_non_hex() {
        assert!(Oid::new("zzz123def4567890abc123def4567890abc12345").is_err());
    }

    #[test]
    fn oid_accepts_sha256_length() {
        let h = "a".repeat(64);
        assert!(Oid::new(h).is_ok());
    }

    #[test]
    fn oid_short_clamps() {
        let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
        assert_eq!(oid.short(7), "abc123d");
        assert_eq!(oid.short(100).len(), 40);
    }

    #[test]
    fn tree_oid_distinct_from_oid() {
        let tree = TreeOid::new("abc123def4567890abc123def4567890abc12345").unwrap();
        assert_eq!(tree.as_str().len(), 40);
    }

    #[test]
    fn ghnum_ordering_and_next() {
        let a = GhNumber::new(1);
        let b = a.next();
        assert!(a < b);
        assert_eq!(b.get(), 2);
    }

    #[test]
    fn pr_url_round_trip() {
        let pr = PullRequestRef::new("octo", "spoon", 42);
        let url = pr.url("github.com");
        assert_eq!(url, "https://github.com/octo/spoon/pull/42");
        assert_eq!(PullRequestRef::parse_url(&url, "github.com").unwrap(), pr);
    }

    #[test]
    fn pr_url_rejects_other_host() {
        assert!(PullRequestRef::parse_url(
            "https://gitlab.com/octo/spoon/pull/42",
            "github.com"
        )
        .is_err());
    }

    #[test]
    fn pr_url_rejects_trailing_segments() {
        assert!(PullRequestRef::parse_url(
            "https://github.com/octo/spoon/pull/42/files",
            "github.com"
        )
        .is_err());
    }

    #[test]
    fn pr_url_enterprise_host() {
        let pr =
            PullRequestRef::parse_url("https://github.example.com/a/b/pull/7", "github.example.com")
                .unwrap();
        assert_eq!(pr.number, 7);
    }

    #[test]
    fn oid_serde_round_trip() {
        let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
        let json = serde_json::to_string(&oid).unwrap();
        let back: Oid = serde_json::from_str(&json).unwrap();
        assert_eq!(oid, back);
    }
}
