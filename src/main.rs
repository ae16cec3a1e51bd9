use dashwire::cli::{parse_args, run_cli_command, CliCommand};
use dashwire::config::DashwireConfig;

use color_eyre::Result;
use tracing::debug;

/// Log to stderr so stdout stays clean for event and log output.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let command = parse_args(std::env::args());

    // Handle --version and --help before any initialization
    if matches!(command, CliCommand::Version | CliCommand::Help) {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        return runtime.block_on(run_cli_command(command, &DashwireConfig::new()));
    }

    color_eyre::install()?;
    init_tracing();

    let config = DashwireConfig::from_env();
    debug!("Using API at {}", config.api_base_url);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_cli_command(command, &config))
}
