//! core::naming
//!
//! The `gh/<username>/<ghnum>/<kind>` branch namespace.
//!
//! Every diff owns three branches on the forge:
//!
//! - `orig`: the user's exact local commit, trailers included
//! - `head`: the commit the PR's diff is computed against; append-only
//! - `base`: the parent the PR targets; append-only (stack mode only)
//!
//! Other `gh/*` branches on the forge are tolerated and ignored; a name that
//! does not parse is simply not ours.

use crate::core::types::GhNumber;

/// Which of the per-diff branches a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchKind {
    /// The user's original commit, trailers included.
    Orig,
    /// The reviewed history; never force-pushed.
    Head,
    /// The synthetic merge target; never force-pushed.
    Base,
}

impl BranchKind {
    /// The path segment used in branch names.
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchKind::Orig => "orig",
            BranchKind::Head => "head",
            BranchKind::Base => "base",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "orig" => Some(BranchKind::Orig),
            "head" => Some(BranchKind::Head),
            "base" => Some(BranchKind::Base),
            _ => None,
        }
    }
}

impl std::fmt::Display for BranchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format a per-diff branch name, e.g. `gh/ezyang/23/head`.
pub fn gh_branch(username: &str, ghnum: GhNumber, kind: BranchKind) -> String {
    format!("gh/{}/{}/{}", username, ghnum, kind)
}

/// A parsed `gh/<username>/<ghnum>/<kind>` branch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhBranchName {
    pub username: String,
    pub ghnum: GhNumber,
    pub kind: BranchKind,
}

impl GhBranchName {
    /// Parse a branch name in the gh namespace.
    ///
    /// Returns `None` for names outside the namespace or malformed ones
    /// (those are tolerated, per the external interface contract).
    ///
    /// # Example
    ///
    /// ```
    /// use ghstack::core::naming::{BranchKind, GhBranchName};
    ///
    /// let b = GhBranchName::parse("gh/ezyang/23/head").unwrap();
    /// assert_eq!(b.username, "ezyang");
    /// assert_eq!(b.ghnum.get(), 23);
    /// assert_eq!(b.kind, BranchKind::Head);
    ///
    /// assert!(GhBranchName::parse("gh/ezyang/x/head").is_none());
    /// assert!(GhBranchName::parse("feature/foo").is_none());
    /// ```
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("gh/")?;
        let mut parts = rest.split('/');
        let username = parts.next()?;
        let ghnum: u64 = parts.next()?.parse().ok()?;
        let kind = BranchKind::from_str(parts.next()?)?;
        if parts.next().is_some() || username.is_empty() {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            ghnum: GhNumber::new(ghnum),
            kind,
        })
    }

    /// Render back to the branch name.
    pub fn to_branch(&self) -> String {
        gh_branch(&self.username, self.ghnum, self.kind)
    }

    /// The sibling branch of a different kind for the same diff.
    pub fn sibling(&self, kind: BranchKind) -> String {
        gh_branch(&self.username, self.ghnum, kind)
    }
}
