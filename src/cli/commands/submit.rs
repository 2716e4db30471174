//! cli::commands::submit
//!
//! Submit the current stack of commits as pull requests.

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::args::SubmitArgs;
use crate::engine::{self, Mode, SubmitOptions};
use crate::ui::output;

use super::Session;

/// Handle `ghstack submit`.
pub async fn submit(cwd: Option<PathBuf>, quiet: bool, args: SubmitArgs) -> Result<()> {
    let session = Session::open(cwd, quiet)?;
    let forge = session.forge()?;

    let repo = engine::repo_preflight(&forge, &session.config.remote_name).await?;
    let default_branch = args.base.clone().unwrap_or(repo.default_branch);

    let mode = if args.direct || session.config.direct {
        Mode::Direct
    } else {
        Mode::Stack
    };

    let ctx = session.stack_context(&forge, default_branch, mode)?;

    let options = SubmitOptions {
        message: args.message.clone(),
        update_fields: args.update_fields,
        force: args.force,
        no_skip: args.no_skip,
        draft: args.draft,
        revs: args.revs.clone(),
        stack: !args.no_stack,
        dry_run: args.dry_run,
    };

    let result = engine::run_submit(&ctx, &options).await?;
    output::submit_summary(&result, args.short, session.verbosity);

    Ok(())
}
