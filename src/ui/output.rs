//! ui::output
//!
//! Output formatting and display.
//!
//! Output is formatted consistently and respects the quiet flag. Diagnostic
//! detail goes through `tracing`; this module is for the human-facing
//! summary lines.

use std::fmt::Display;

use crate::engine::SubmitResult;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print the end-of-run submit summary.
///
/// With `short`, print only the PR URLs, top of stack first.
pub fn submit_summary(result: &SubmitResult, short: bool, verbosity: Verbosity) {
    if short {
        for diff in result.diffs.iter().rev() {
            println!("{}", diff.pr_url);
        }
        return;
    }

    if verbosity == Verbosity::Quiet {
        return;
    }

    println!();
    if result.dry_run {
        println!("# Summary of changes (dry run; nothing was written)");
    } else {
        println!("# Summary of changes");
    }
    println!();

    if result.diffs.is_empty() {
        println!("No pull requests updated; all commits in your diff stack were empty!");
    } else {
        for diff in result.diffs.iter().rev() {
            println!(" - {} {}", diff.what, diff.pr_url);
        }
    }

    if !result.ignored.is_empty() {
        println!();
        println!("FYI: I ignored the following commits, because they had no changes:");
        println!();
        for ignored in result.ignored.iter().rev() {
            println!(" - {} {}", ignored.oid.short(8), ignored.title);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false), Verbosity::Normal);
    }

    #[test]
    fn what_happened_formats_into_summary_lines() {
        // Smoke test the Display impl the summary relies on.
        assert_eq!(
            format!("{}", crate::engine::WhatHappened::Created),
            "Created"
        );
    }
}
