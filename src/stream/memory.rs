//! In-memory stream service
//!
//! Holds records per (stream, shard) in process memory and hands out
//! `MemoryEndpoint`s bound to one shard. Cloning the service clones a handle:
//! every clone and every endpoint sees the same records, so a Producer and a
//! Listener wired to endpoints from one service exchange messages.
//!
//! Failures can be injected with `fail_next_puts` and `fail_next_gets` to
//! exercise the non-fatal error paths of the pump and pull loops.

use crate::core::sync::handle_mutex_poison;
use crate::stream::endpoint::Endpoint;
use crate::stream::error::{TransportError, TransportOp};
use crate::stream::message::Message;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Default cap on records returned by one `get`, matching the remote service
pub const DEFAULT_RECORDS_PER_GET: usize = 10_000;

/// Where a new endpoint starts reading its shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
    /// Oldest record still held by the shard
    #[default]
    TrimHorizon,
    /// Only records put after the endpoint was created
    Latest,
}

type ShardKey = (String, String);

#[derive(Debug, Default)]
struct ServiceState {
    shards: Mutex<HashMap<ShardKey, Vec<Message>>>,
    failing_puts: AtomicUsize,
    failing_gets: AtomicUsize,
}

impl ServiceState {
    /// Consume one injected failure, if any are pending
    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStreamService {
    state: Arc<ServiceState>,
    records_per_get: usize,
}

impl Default for MemoryStreamService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStreamService {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ServiceState::default()),
            records_per_get: DEFAULT_RECORDS_PER_GET,
        }
    }

    /// Limit how many records each `get` on endpoints from this handle returns
    pub fn with_records_per_get(mut self, limit: usize) -> Self {
        self.records_per_get = limit.max(1);
        self
    }

    /// Endpoint reading the shard from its oldest record
    pub fn endpoint(&self, stream: &str, shard: &str) -> MemoryEndpoint {
        self.endpoint_at(stream, shard, StartPosition::TrimHorizon)
    }

    pub fn endpoint_at(&self, stream: &str, shard: &str, position: StartPosition) -> MemoryEndpoint {
        let cursor = match position {
            StartPosition::TrimHorizon => 0,
            StartPosition::Latest => self.records(stream, shard).len(),
        };

        MemoryEndpoint {
            state: self.state.clone(),
            stream: stream.to_string(),
            shard: shard.to_string(),
            cursor: Mutex::new(cursor),
            records_per_get: self.records_per_get,
        }
    }

    /// Make the next `count` puts on any endpoint fail
    pub fn fail_next_puts(&self, count: usize) {
        self.state.failing_puts.fetch_add(count, Ordering::AcqRel);
    }

    /// Make the next `count` gets on any endpoint fail
    pub fn fail_next_gets(&self, count: usize) {
        self.state.failing_gets.fetch_add(count, Ordering::AcqRel);
    }

    /// Snapshot of every record stored on a shard, oldest first
    pub fn records(&self, stream: &str, shard: &str) -> Vec<Message> {
        match self.state.shards.lock() {
            Ok(shards) => shards
                .get(&(stream.to_string(), shard.to_string()))
                .cloned()
                .unwrap_or_default(),
            Err(poisoned) => poisoned
                .into_inner()
                .get(&(stream.to_string(), shard.to_string()))
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// Endpoint bound to one shard of a `MemoryStreamService`
#[derive(Debug)]
pub struct MemoryEndpoint {
    state: Arc<ServiceState>,
    stream: String,
    shard: String,
    /// Index of the next record this endpoint's `get` returns
    cursor: Mutex<usize>,
    records_per_get: usize,
}

impl MemoryEndpoint {
    fn error(&self, operation: TransportOp, message: impl Into<String>) -> TransportError {
        TransportError::new(operation, &self.stream, &self.shard, message)
    }

    fn key(&self) -> ShardKey {
        (self.stream.clone(), self.shard.clone())
    }
}

#[async_trait::async_trait]
impl Endpoint for MemoryEndpoint {
    fn stream_name(&self) -> &str {
        &self.stream
    }

    fn shard_id(&self) -> &str {
        &self.shard
    }

    async fn put(&self, message: &Message) -> Result<(), TransportError> {
        if ServiceState::take_failure(&self.state.failing_puts) {
            return Err(self.error(TransportOp::Put, "injected put failure"));
        }

        let mut shards = handle_mutex_poison(self.state.shards.lock(), |detail| {
            self.error(TransportOp::Put, detail)
        })?;
        let records = shards.entry(self.key()).or_default();
        let sequence_number = format!("{:020}", records.len() + 1);
        records.push(message.clone().with_sequence_number(sequence_number));
        Ok(())
    }

    async fn get(&self) -> Result<Vec<Message>, TransportError> {
        if ServiceState::take_failure(&self.state.failing_gets) {
            return Err(self.error(TransportOp::Get, "injected get failure"));
        }

        let shards = handle_mutex_poison(self.state.shards.lock(), |detail| {
            self.error(TransportOp::Get, detail)
        })?;
        let mut cursor = handle_mutex_poison(self.cursor.lock(), |detail| {
            self.error(TransportOp::Get, detail)
        })?;

        let Some(records) = shards.get(&self.key()) else {
            return Ok(Vec::new());
        };

        let start = (*cursor).min(records.len());
        let end = start.saturating_add(self.records_per_get).min(records.len());
        *cursor = end;
        Ok(records[start..end].to_vec())
    }
}
