//! Stream record type
//!
//! A `Message` is an immutable payload plus the partition key used by the
//! remote service to route it to a shard. Records read back from a service
//! also carry the sequence number it assigned.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Immutable stream record
///
/// # Example
///
/// ```rust
/// use kinetic::stream::Message;
///
/// let message = Message::new("hello", "test");
/// assert_eq!(message.value(), b"hello");
/// assert_eq!(message.partition_key(), "test");
/// assert_eq!(message.sequence_number(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    value: Vec<u8>,
    partition_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sequence_number: Option<String>,
}

impl Message {
    pub fn new(value: impl Into<Vec<u8>>, partition_key: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            partition_key: partition_key.into(),
            sequence_number: None,
        }
    }

    /// Copy of this record stamped with the sequence number a service assigned
    pub fn with_sequence_number(self, sequence_number: impl Into<String>) -> Self {
        Self {
            sequence_number: Some(sequence_number.into()),
            ..self
        }
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Payload as text, replacing invalid UTF-8
    pub fn value_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn sequence_number(&self) -> Option<&str> {
        self.sequence_number.as_deref()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }
}
