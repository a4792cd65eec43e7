//! TOML configuration file loading
//!
//! The file has four optional sections:
//!
//! ```toml
//! [stream]
//! name = "orders"
//! shard = "shard-0"
//! start_position = "trim_horizon"
//!
//! [producer]
//! queue_capacity = 1000
//! put_attempts = 3
//!
//! [listener]
//! poll_interval_ms = 200
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```
//!
//! With no `--config-file` the default `<config_dir>/Kinetic/kinetic.toml`
//! is read if it exists. Command line options override file values.

use super::args::Args;
use crate::core::logging::{LOG_FORMATS, LOG_LEVELS};
use crate::stream::api::{ListenerConfig, ProducerConfig, StreamError, StreamSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("The specified configuration file does not exist: {}", .path.display())]
    Missing { path: PathBuf },

    #[error("Error reading configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error parsing configuration file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] StreamError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<String>,
    pub color: Option<bool>,
}

impl LogSettings {
    fn validate(&self) -> Result<(), StreamError> {
        if let Some(level) = &self.level {
            if !LOG_LEVELS.contains(&level.as_str()) {
                return Err(StreamError::config(format!(
                    "log level '{}' is not one of {}",
                    level,
                    LOG_LEVELS.join(", ")
                )));
            }
        }
        if let Some(format) = &self.format {
            if !LOG_FORMATS.contains(&format.as_str()) {
                return Err(StreamError::config(format!(
                    "log format '{}' is not one of {}",
                    format,
                    LOG_FORMATS.join(", ")
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub stream: StreamSettings,
    pub producer: ProducerConfig,
    pub listener: ListenerConfig,
    pub logging: LogSettings,
}

impl AppConfig {
    /// Default config file location, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("Kinetic").join("kinetic.toml"))
    }

    /// Load the explicit file, else the default file if present, else defaults
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub async fn load(config_file: Option<&Path>) -> Result<Self, ConfigFileError> {
        let path = match config_file {
            Some(path) if !path.exists() => {
                return Err(ConfigFileError::Missing {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("No configuration file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigFileError::Read {
                path: path.clone(),
                source,
            })?;
        let config = Self::parse(&contents).map_err(|source| ConfigFileError::Parse {
            path: path.clone(),
            source,
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Let command line options replace file values
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(stream) = &args.stream {
            self.stream.name = stream.clone();
        }
        if let Some(shard) = &args.shard {
            self.stream.shard = shard.clone();
        }
        if args.log_level.is_some() {
            self.logging.level = args.log_level.clone();
        }
        if args.log_format.is_some() {
            self.logging.format = args.log_format.clone();
        }
        if args.log_file.is_some() {
            self.logging.file = args.log_file.clone();
        }
        if let Some(color) = args.color_choice() {
            self.logging.color = Some(color);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigFileError> {
        self.stream.validate()?;
        self.producer.validate()?;
        self.listener.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
