//! Shared helpers for the CLI integration tests

mod run;
mod toml_config;

use std::process::{Command, Output, Stdio};

/// Command for the built binary with an isolated config directory
///
/// Pointing the config directories at an empty temp dir keeps a developer's
/// own `kinetic.toml` out of the tests.
pub fn kinetic(config_home: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_kinetic"));
    command
        .env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .stdin(Stdio::null());
    command
}

pub fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}
