//! ghstack - Submit a stack of commits to GitHub as interlinked pull requests
//!
//! ghstack turns a linear sequence of local commits into one pull request per
//! commit, and keeps the remote branches synchronized across repeated edits
//! (amend, reorder, rebase, insert, remove).
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Stack selection, diff classification, submit/land/unlink
//! - [`core`] - Domain types, configuration, and the consumed-number ledger
//! - [`msg`] - Commit-message trailer codec and source-id hashing
//! - [`body`] - Pull request body navigator rendering and parsing
//! - [`git`] - Single interface for all Git operations
//! - [`forge`] - Abstraction for the remote hosting service (GitHub v1)
//! - [`ui`] - Output formatting
//!
//! # Correctness invariants
//!
//! 1. Every selected commit maps to exactly one `(ghnum, PR)` pair, and every
//!    open PR in the stack maps back to exactly one selected commit
//! 2. `head` and `base` branches only ever grow; they are never force-pushed
//! 3. The `orig` branch always carries trailers matching what the engine last
//!    wrote, so concurrent remote edits are detected, not merged
//! 4. Classification runs to completion before any write; rejections abort
//!    with the remote untouched

pub mod body;
pub mod cli;
pub mod core;
pub mod engine;
pub mod forge;
pub mod git;
pub mod msg;
pub mod ui;
