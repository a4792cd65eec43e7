//! Streaming Pipeline
//!
//! A `Producer` that forwards application messages to a remote append-only
//! stream, and a `Listener` that pulls records back from one shard of it.
//! Both reach the service through an `Endpoint` bound to a stream and shard;
//! `MemoryStreamService` provides an in-process one.
//!
//! # Architecture
//!
//! ```text
//!  send()/send_batch()                               retrieve()/messages()
//!        │                                                    ▲
//!        ▼                                                    │
//! ┌──────────────┐  pump   ┌──────────┐  pull  ┌──────────────┴─┐
//! │ MessageQueue │ ──────▶ │ Endpoint │ ─────▶ │  MessageQueue  │
//! │  (producer)  │  put()  │ (shard)  │  get() │   (listener)   │
//! └──────────────┘         └──────────┘        └────────────────┘
//!        │                      │                       │
//!  interrupt()/close()     errors() channel         close()
//!  SIGINT/SIGTERM          error_count()
//! ```
//!
//! - **FIFO**: messages are put in the order they were sent, and retrieved in
//!   the order the endpoint returned them
//! - **Non-fatal transport errors**: failed puts and gets are counted and
//!   published on a broadcast channel; the loops keep running
//! - **One loop per instance**: a second `produce`/`consume` while one is
//!   running fails with `AlreadyRunning`
//! - **Terminal close**: `close()` stops the loop, releases the endpoint and
//!   is idempotent; sends after it fail with `Closed`
//!
//! # Example Usage
//!
//! ```rust
//! use kinetic::stream::api::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = MemoryStreamService::new();
//!
//! let producer = Producer::new("orders", "shard-0", ProducerConfig::default())?;
//! producer.set_endpoint(service.endpoint("orders", "shard-0"))?;
//! producer.start()?;
//! producer.send(Message::new("hello", "test"))?;
//!
//! let listener = Listener::new("orders", "shard-0", ListenerConfig::default())?;
//! listener.set_endpoint(service.endpoint("orders", "shard-0"))?;
//! listener.start()?;
//!
//! let message = listener.retrieve().await?;
//! assert_eq!(message.value(), b"hello");
//!
//! producer.close().await?;
//! listener.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod endpoint;
pub mod error;
mod lifecycle;
pub mod listener;
pub mod memory;
pub mod message;
pub mod producer;
pub mod queue;

pub use config::{ListenerConfig, ProducerConfig, StreamSettings};
pub use endpoint::Endpoint;
pub use error::{StreamError, StreamResult, TransportError, TransportOp};
pub use listener::Listener;
pub use memory::{MemoryEndpoint, MemoryStreamService, StartPosition};
pub use message::Message;
pub use producer::{Interrupt, InterruptHandle, Producer};
pub use queue::MessageQueue;

#[cfg(test)]
mod tests;
