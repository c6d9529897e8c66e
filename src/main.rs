//! pakr CLI entry point.
//!
//! Parses arguments, runs the build pipeline, and turns failures into
//! user-friendly error output with suggestions where the error type carries
//! one.

use anyhow::Result;
use clap::Parser;
use pakr::cli::Cli;
use pakr::core::user_friendly_error;

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute() {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
