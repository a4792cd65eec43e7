//! Endpoint Trait
//!
//! The transport binding a Producer or Listener talks through. An endpoint is
//! bound to one stream and one shard; the wire protocol, credentials and
//! serialisation live behind it.

use crate::stream::error::TransportError;
use crate::stream::message::Message;

/// Put/get capability for one stream shard
///
/// Both operations may be slow and may fail. Callers make no assumption
/// about ordering or delivery beyond "what was put is eventually returned by
/// `get` on an endpoint bound to the same stream and shard".
#[async_trait::async_trait]
pub trait Endpoint: Send + Sync {
    fn stream_name(&self) -> &str;

    fn shard_id(&self) -> &str;

    /// Send a single record
    async fn put(&self, message: &Message) -> Result<(), TransportError>;

    /// Fetch records that arrived since the previous call, possibly none
    async fn get(&self) -> Result<Vec<Message>, TransportError>;
}
