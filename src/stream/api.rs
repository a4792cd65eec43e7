//! Public API for the streaming pipeline
//!
//! External modules should import from here rather than directly from the
//! individual stream modules.

// Pipeline components
pub use crate::stream::listener::Listener;
pub use crate::stream::producer::{Interrupt, InterruptHandle, Producer};

// Transport seam and the in-memory service
pub use crate::stream::endpoint::Endpoint;
pub use crate::stream::memory::{MemoryEndpoint, MemoryStreamService, StartPosition};

// Messages and buffering
pub use crate::stream::message::Message;
pub use crate::stream::queue::MessageQueue;

// Configuration
pub use crate::stream::config::{ListenerConfig, ProducerConfig, StreamSettings};

// Error handling
pub use crate::stream::error::{StreamError, StreamResult, TransportError, TransportOp};
