//! CLI module for dashwire.
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing
//! - Version display
//! - `run`, streaming a scenario over SSE
//! - `watch`, following live events over the WebSocket
//!
//! # Usage
//!
//! ```ignore
//! use dashwire::cli::{parse_args, run_cli_command};
//!
//! let command = parse_args(std::env::args());
//! run_cli_command(command, &config).await?;
//! ```

pub mod args;
pub mod output;
pub mod run;
pub mod version;
pub mod watch;

pub use args::{parse_args, CliCommand, USAGE};
pub use run::handle_run_command;
pub use version::{handle_version_command, VERSION};
pub use watch::handle_watch_command;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::config::DashwireConfig;
use crate::sse::StreamRequest;

/// Execute a parsed command.
pub async fn run_cli_command(command: CliCommand, config: &DashwireConfig) -> Result<()> {
    match command {
        CliCommand::Version => {
            handle_version_command();
            Ok(())
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        CliCommand::Invalid { message } => {
            eprintln!("{}", USAGE);
            Err(eyre!(message))
        }
        CliCommand::Run {
            scenario,
            preset,
            fail_fast,
            link_id,
        } => {
            let mut request = StreamRequest::new(scenario).with_fail_fast(fail_fast);
            request.preset = preset;
            request.link_id = link_id;
            handle_run_command(config, request).await
        }
        CliCommand::Watch { run_ids } => handle_watch_command(config, run_ids).await,
    }
}
