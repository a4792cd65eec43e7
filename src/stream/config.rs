//! Producer and listener settings
//!
//! Plain serde structs passed into `Producer::new` / `Listener::new`. Every
//! field has a default, so a TOML section may set any subset of them.

use crate::core::retry::{ExponentialBackoff, RetryPolicy};
use crate::core::validation::{validate_positive, validate_shard_id, validate_stream_name};
use crate::stream::error::{StreamError, StreamResult};
use crate::stream::memory::StartPosition;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ERROR_CHANNEL_CAPACITY: usize = 64;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
pub const DEFAULT_BACKOFF_INITIAL_MS: u64 = 100;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProducerConfig {
    /// Maximum queued messages; `None` means unbounded
    pub queue_capacity: Option<usize>,
    /// Tries per message before a put failure is counted
    pub put_attempts: usize,
    pub put_retry_delay_ms: u64,
    pub error_channel_capacity: usize,
    /// Stop the pump on SIGINT/SIGTERM
    pub stop_on_signal: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            put_attempts: 1,
            put_retry_delay_ms: 100,
            error_channel_capacity: DEFAULT_ERROR_CHANNEL_CAPACITY,
            stop_on_signal: true,
        }
    }
}

impl ProducerConfig {
    pub fn validate(&self) -> StreamResult<()> {
        if let Some(capacity) = self.queue_capacity {
            validate_positive("queue_capacity", capacity).map_err(StreamError::config)?;
        }
        validate_positive("put_attempts", self.put_attempts).map_err(StreamError::config)?;
        validate_positive("error_channel_capacity", self.error_channel_capacity)
            .map_err(StreamError::config)?;
        Ok(())
    }

    pub fn put_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.put_attempts,
            delay: Duration::from_millis(self.put_retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenerConfig {
    /// Buffered messages above which the pull loop stops fetching
    pub buffer_capacity: Option<usize>,
    /// Pause after a get that returned nothing
    pub poll_interval_ms: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub error_channel_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            backoff_initial_ms: DEFAULT_BACKOFF_INITIAL_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            error_channel_capacity: DEFAULT_ERROR_CHANNEL_CAPACITY,
        }
    }
}

impl ListenerConfig {
    pub fn validate(&self) -> StreamResult<()> {
        if let Some(capacity) = self.buffer_capacity {
            validate_positive("buffer_capacity", capacity).map_err(StreamError::config)?;
        }
        validate_positive("error_channel_capacity", self.error_channel_capacity)
            .map_err(StreamError::config)?;
        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(StreamError::config(format!(
                "backoff_max_ms ({}) must not be less than backoff_initial_ms ({})",
                self.backoff_max_ms, self.backoff_initial_ms
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }
}

/// Which shard to bind and where to start reading it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSettings {
    pub name: String,
    pub shard: String,
    pub start_position: StartPosition,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            name: "kinetic".to_string(),
            shard: "shard-0".to_string(),
            start_position: StartPosition::TrimHorizon,
        }
    }
}

impl StreamSettings {
    pub fn validate(&self) -> StreamResult<()> {
        validate_identifiers(&self.name, &self.shard)
    }
}

/// Check a stream name and shard id pair
pub fn validate_identifiers(stream: &str, shard: &str) -> StreamResult<()> {
    validate_stream_name(stream).map_err(StreamError::config)?;
    validate_shard_id(shard).map_err(StreamError::config)?;
    Ok(())
}
