//! Command-line argument parsing for the dashwire CLI.
//!
//! This module handles parsing command-line arguments and determining
//! which CLI command to execute.

/// Usage text printed by `--help` and on invalid input.
pub const USAGE: &str = "\
Usage:
  dashwire run <SCENARIO> [--preset NAME] [--fail-fast] [--link ID]
  dashwire watch [RUN_ID...]
  dashwire --version
  dashwire --help

Environment:
  DASHWIRE_API_URL          API base URL (default http://127.0.0.1:8000)
  DASHWIRE_MAX_RECONNECTS   WebSocket reconnect budget (default 5)
  RUST_LOG                  Log filter (default info)";

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Stream a scenario run and print its log
    Run {
        scenario: String,
        preset: Option<String>,
        fail_fast: bool,
        link_id: Option<String>,
    },
    /// Follow live run events over the WebSocket
    Watch { run_ids: Vec<String> },
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Arguments could not be understood
    Invalid { message: String },
}

impl CliCommand {
    fn invalid(message: impl Into<String>) -> Self {
        CliCommand::Invalid {
            message: message.into(),
        }
    }
}

/// Parse command-line arguments and return the appropriate command.
///
/// # Arguments
///
/// * `args` - Iterator of command-line arguments (typically `std::env::args()`)
///
/// # Examples
///
/// ```
/// use dashwire::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["dashwire".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    // Skip the program name
    let mut args = args.skip(1);

    let Some(first) = args.next() else {
        return CliCommand::Help;
    };

    match first.as_str() {
        "--version" | "-V" => CliCommand::Version,
        "--help" | "-h" | "help" => CliCommand::Help,
        "run" => parse_run(args),
        "watch" => parse_watch(args),
        other => CliCommand::invalid(format!("Unknown command '{}'", other)),
    }
}

fn parse_run<I>(mut args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    let mut scenario = None;
    let mut preset = None;
    let mut fail_fast = false;
    let mut link_id = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fail-fast" => fail_fast = true,
            "--preset" => match args.next() {
                Some(value) => preset = Some(value),
                None => return CliCommand::invalid("--preset requires a value"),
            },
            "--link" => match args.next() {
                Some(value) => link_id = Some(value),
                None => return CliCommand::invalid("--link requires a value"),
            },
            flag if flag.starts_with("--") => {
                return CliCommand::invalid(format!("Unknown flag '{}'", flag));
            }
            _ if scenario.is_none() => scenario = Some(arg),
            _ => return CliCommand::invalid(format!("Unexpected argument '{}'", arg)),
        }
    }

    match scenario {
        Some(scenario) => CliCommand::Run {
            scenario,
            preset,
            fail_fast,
            link_id,
        },
        None => CliCommand::invalid("run requires a scenario name"),
    }
}

fn parse_watch<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    let mut run_ids = Vec::new();
    for arg in args {
        if arg.starts_with("--") {
            return CliCommand::invalid(format!("Unknown flag '{}'", arg));
        }
        run_ids.push(arg);
    }
    CliCommand::Watch { run_ids }
}
