//! ghstack binary entry point.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // --debug raises the filter; GHSTACK_LOG overrides both.
    let debug = std::env::args().any(|a| a == "--debug");
    let default_filter = if debug { "ghstack=debug" } else { "ghstack=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GHSTACK_LOG")
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match ghstack::cli::run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            ghstack::ui::output::error(format!("{:#}", e));
            ExitCode::from(1)
        }
    }
}
