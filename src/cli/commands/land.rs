//! cli::commands::land
//!
//! Land an accepted stack into the upstream default branch.

use std::path::PathBuf;

use anyhow::Result;

use crate::engine::{self, LandOptions, Mode};
use crate::ui::output::{self, Verbosity};

use super::Session;

/// Handle `ghstack land <pr-url>`.
pub async fn land(cwd: Option<PathBuf>, quiet: bool, pr_url: &str, force: bool) -> Result<()> {
    let session = Session::open(cwd, quiet)?;
    let forge = session.forge()?;

    let repo = engine::repo_preflight(&forge, &session.config.remote_name).await?;

    // Landing always targets the repository's default branch; mode only
    // matters for submit-side branch layout.
    let ctx = session.stack_context(&forge, repo.default_branch, Mode::Stack)?;

    let result = engine::run_land(&ctx, pr_url, &LandOptions { force }).await?;

    if session.verbosity != Verbosity::Quiet {
        for number in &result.landed {
            output::print(format!("Landed #{}", number), session.verbosity);
        }
        output::print(
            format!(
                "{} is now at {}",
                ctx.default_branch,
                result.new_tip.short(12)
            ),
            session.verbosity,
        );
    }

    Ok(())
}
