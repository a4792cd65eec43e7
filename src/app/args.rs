//! Command line arguments
//!
//! Every option that can also be set in the configuration file is optional
//! here, so `None` means "use the file value or the default".

use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "kinetic")]
#[command(about = "Send messages through a stream shard and read them back")]
#[command(version, long_version = crate::core::version::long_version())]
#[command(after_help = "Messages are sent in order with the configured partition key; \
    with no MESSAGES and no --stdin nothing is sent.")]
pub struct Args {
    /// Messages to send
    #[arg(value_name = "MESSAGES")]
    pub messages: Vec<String>,

    /// Read messages from standard input, one per line
    #[arg(long = "stdin", action = ArgAction::SetTrue)]
    pub stdin: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Stream name
    #[arg(short = 's', long = "stream", value_name = "NAME")]
    pub stream: Option<String>,

    /// Shard id
    #[arg(long = "shard", value_name = "ID")]
    pub shard: Option<String>,

    /// Partition key attached to every message
    #[arg(
        short = 'k',
        long = "partition-key",
        value_name = "KEY",
        default_value = "kinetic"
    )]
    pub partition_key: String,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = crate::core::logging::LOG_LEVELS)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = crate::core::logging::LOG_FORMATS)]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<String>,

    /// Force colored log output
    #[arg(long = "color", action = ArgAction::SetTrue, overrides_with = "no_color")]
    pub color: bool,

    /// Disable colored log output
    #[arg(long = "no-color", action = ArgAction::SetTrue, overrides_with = "color")]
    pub no_color: bool,

    /// Give up waiting for messages after this many milliseconds
    #[arg(short = 't', long = "timeout-ms", value_name = "MS", default_value_t = 5_000)]
    pub timeout_ms: u64,
}

impl Args {
    /// Explicit colour choice: `Some(true)` for --color, `Some(false)` for --no-color
    pub fn color_choice(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
