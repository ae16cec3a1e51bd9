//! Version command for the dashwire CLI.

/// The current version of dashwire, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version line as printed by `--version`.
pub fn version_string() -> String {
    format!("dashwire {}", VERSION)
}

/// Handle the --version command.
pub fn handle_version_command() {
    println!("{}", version_string());
}
