//! core::ledger
//!
//! The consumed gh-number ledger.
//!
//! A gh number is unique within the repository and is never reused after its
//! pull request closes. Landing retires numbers here; allocation consults the
//! ledger so that even after the `gh/*` branches are deleted, a retired
//! number stays retired.
//!
//! # Storage
//!
//! A JSON blob behind the local ref `refs/ghstack/consumed`, written through
//! the Git doorway. The blob is a plain sorted array of numbers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::GhNumber;
use crate::git::{Git, GitError};

/// Ref holding the ledger blob.
pub const LEDGER_REF: &str = "refs/ghstack/consumed";

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to parse consumed ledger: {0}")]
    Parse(String),

    #[error("failed to serialize consumed ledger: {0}")]
    Serialize(String),

    #[error(transparent)]
    Git(#[from] GitError),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerBlob {
    consumed: Vec<u64>,
}

/// The set of gh numbers retired by `land`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumedLedger {
    numbers: Vec<u64>,
}

impl ConsumedLedger {
    /// Read the ledger, or an empty one if it has never been written.
    pub fn read(git: &Git) -> Result<Self, LedgerError> {
        let Some(blob_oid) = git.try_resolve_ref_to_object(LEDGER_REF)? else {
            return Ok(Self::default());
        };

        let raw = git.read_blob(&blob_oid)?;
        let blob: LedgerBlob =
            serde_json::from_slice(&raw).map_err(|e| LedgerError::Parse(e.to_string()))?;

        let mut numbers = blob.consumed;
        numbers.sort_unstable();
        numbers.dedup();
        Ok(Self { numbers })
    }

    /// Whether a number has been retired.
    pub fn contains(&self, ghnum: GhNumber) -> bool {
        self.numbers.binary_search(&ghnum.get()).is_ok()
    }

    /// The highest retired number, if any.
    pub fn max(&self) -> Option<GhNumber> {
        self.numbers.last().copied().map(GhNumber::new)
    }

    /// Retire numbers and persist the ledger.
    pub fn consume(&mut self, git: &Git, ghnums: &[GhNumber]) -> Result<(), LedgerError> {
        for n in ghnums {
            self.numbers.push(n.get());
        }
        self.numbers.sort_unstable();
        self.numbers.dedup();

        let blob = LedgerBlob {
            consumed: self.numbers.clone(),
        };
        let raw =
            serde_json::to_vec(&blob).map_err(|e| LedgerError::Serialize(e.to_string()))?;
        let blob_oid = git.write_blob(&raw)?;
        git.set_ref(LEDGER_REF, &blob_oid, "ghstack: record consumed numbers")?;
        Ok(())
    }
}
