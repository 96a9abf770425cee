//! Demonstration binary for `framestate`.
//!
//! Synthesises a fragmented link capture and checks that replays in any
//! order reproduce the writing pass.

mod cli;
mod demo;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    match demo::run(&cli) {
        Ok(summary) => {
            info!(
                frames = summary.frames,
                messages = summary.messages,
                warnings = summary.warnings,
                replays = summary.replays,
                depth = summary.depth,
                "every replay matched the writing pass"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "demonstration failed");
            ExitCode::FAILURE
        }
    }
}
