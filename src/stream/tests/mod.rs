//! Test modules for the streaming pipeline
//!
//! Tests are organised by component; `pipeline` wires producers and
//! listeners together through a shared in-memory service.

mod producer;

use crate::stream::api::{ListenerConfig, ProducerConfig};
use tokio::time::{sleep, Duration, Instant};

pub(super) const STREAM: &str = "orders";
pub(super) const SHARD: &str = "shard-0";

/// Producer settings for tests: no OS signal handlers
pub(super) fn test_producer_config() -> ProducerConfig {
    ProducerConfig {
        stop_on_signal: false,
        ..Default::default()
    }
}

/// Listener settings for tests: short polls and backoff
pub(super) fn test_listener_config() -> ListenerConfig {
    ListenerConfig {
        poll_interval_ms: 5,
        backoff_initial_ms: 1,
        backoff_max_ms: 10,
        ..Default::default()
    }
}

/// Wait until `condition` holds, failing the test after two seconds
pub(super) async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        if Instant::now() >= deadline {
            panic!("Timed out waiting for {}", what);
        }
        sleep(Duration::from_millis(5)).await;
    }
}
