//! Stream Error Types

use std::fmt;

/// Which endpoint operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOp {
    Put,
    Get,
}

impl fmt::Display for TransportOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportOp::Put => write!(f, "put"),
            TransportOp::Get => write!(f, "get"),
        }
    }
}

/// A failed call to an endpoint
///
/// Transport errors never stop a pump or pull loop. They are counted and
/// published on the owner's error channel, so they are cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed on {stream}/{shard}: {message}")]
pub struct TransportError {
    pub operation: TransportOp,
    pub stream: String,
    pub shard: String,
    pub message: String,
}

impl TransportError {
    pub fn new(
        operation: TransportOp,
        stream: impl Into<String>,
        shard: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            stream: stream.into(),
            shard: shard.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("{component} is not initialised: {message}")]
    NotInitialized {
        component: &'static str,
        message: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{component} is closed")]
    Closed { component: &'static str },

    #[error("Queue is full (max size: {max_size})")]
    QueueFull { max_size: usize },

    #[error("{component} is already running")]
    AlreadyRunning { component: &'static str },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StreamError {
    pub fn config(message: impl Into<String>) -> Self {
        StreamError::Config {
            message: message.into(),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, StreamError::Closed { .. })
    }
}

impl crate::core::error_handling::ContextualError for StreamError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, StreamError::Config { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            StreamError::Config { message } => Some(message),
            _ => None,
        }
    }
}

impl crate::core::error_handling::ContextualError for TransportError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;
