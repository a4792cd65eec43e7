//! Listener
//!
//! A pull loop fetches batches from the bound endpoint into a local buffer;
//! callers take messages from the buffer in arrival order with `retrieve`
//! and friends. Get failures are counted, published on the error channel,
//! and retried after an exponential backoff.
//!
//! `close()` is the only way to stop the pull loop. Messages already
//! buffered stay retrievable after it; once the buffer is drained every
//! retrieval fails with `StreamError::Closed`.

use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use crate::stream::config::{validate_identifiers, ListenerConfig};
use crate::stream::endpoint::Endpoint;
use crate::stream::error::{StreamError, StreamResult, TransportError};
use crate::stream::lifecycle::{LoopState, StopSignal};
use crate::stream::message::Message;
use crate::stream::queue::MessageQueue;
use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, info, warn};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const COMPONENT: &str = "listener";

struct ListenerInner {
    stream: String,
    shard: String,
    config: ListenerConfig,
    endpoint: RwLock<Option<Arc<dyn Endpoint>>>,
    buffer: MessageQueue,
    state: LoopState,
    closed: StopSignal,
    error_count: AtomicU64,
    received_count: AtomicU64,
    errors: broadcast::Sender<TransportError>,
}

/// Handle to a listener; clones share the same buffer and pull loop
#[derive(Clone)]
pub struct Listener {
    inner: Arc<ListenerInner>,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("stream", &self.inner.stream)
            .field("shard", &self.inner.shard)
            .field("consuming", &self.is_consuming())
            .field("buffered", &self.buffered())
            .field("error_count", &self.error_count())
            .finish()
    }
}

impl Listener {
    pub fn new(stream: &str, shard: &str, config: ListenerConfig) -> StreamResult<Self> {
        validate_identifiers(stream, shard)?;
        config.validate()?;

        let (errors, _) = broadcast::channel(config.error_channel_capacity);

        Ok(Self {
            inner: Arc::new(ListenerInner {
                stream: stream.to_string(),
                shard: shard.to_string(),
                buffer: MessageQueue::new(COMPONENT, config.buffer_capacity),
                config,
                endpoint: RwLock::new(None),
                state: LoopState::new(),
                closed: StopSignal::new(),
                error_count: AtomicU64::new(0),
                received_count: AtomicU64::new(0),
                errors,
            }),
        })
    }

    /// Bind or replace the endpoint records are pulled from
    pub fn set_endpoint(&self, endpoint: impl Endpoint + 'static) -> StreamResult<()> {
        self.set_shared_endpoint(Arc::new(endpoint))
    }

    pub fn set_shared_endpoint(&self, endpoint: Arc<dyn Endpoint>) -> StreamResult<()> {
        self.ensure_open()?;
        if endpoint.stream_name() != self.inner.stream || endpoint.shard_id() != self.inner.shard
        {
            return Err(StreamError::config(format!(
                "endpoint is bound to {}/{}, listener to {}/{}",
                endpoint.stream_name(),
                endpoint.shard_id(),
                self.inner.stream,
                self.inner.shard
            )));
        }

        let mut slot = handle_rwlock_write(self.inner.endpoint.write(), |message| {
            StreamError::Internal { message }
        })?;
        *slot = Some(endpoint);
        Ok(())
    }

    fn current_endpoint(&self) -> StreamResult<Arc<dyn Endpoint>> {
        let slot = handle_rwlock_read(self.inner.endpoint.read(), |message| {
            StreamError::Internal { message }
        })?;
        slot.clone().ok_or_else(|| StreamError::NotInitialized {
            component: COMPONENT,
            message: format!(
                "no endpoint bound for {}/{}",
                self.inner.stream, self.inner.shard
            ),
        })
    }

    fn ensure_open(&self) -> StreamResult<()> {
        if self.is_closed() {
            Err(StreamError::Closed {
                component: COMPONENT,
            })
        } else {
            Ok(())
        }
    }

    fn begin(&self) -> StreamResult<()> {
        self.ensure_open()?;
        self.current_endpoint()?;
        if !self.inner.state.try_start() {
            return Err(StreamError::AlreadyRunning {
                component: COMPONENT,
            });
        }
        info!(
            "Listener {}/{} started",
            self.inner.stream, self.inner.shard
        );
        Ok(())
    }

    /// Run the pull loop on the current task until `close()`
    pub async fn consume(&self) -> StreamResult<()> {
        self.begin()?;
        let _running = self.inner.state.guard();
        self.pull().await;
        Ok(())
    }

    /// Spawn the pull loop; `is_consuming()` is true when this returns
    pub fn start(&self) -> StreamResult<JoinHandle<()>> {
        self.begin()?;
        let listener = self.clone();
        Ok(tokio::spawn(async move {
            let _running = listener.inner.state.guard();
            listener.pull().await;
        }))
    }

    async fn pull(&self) {
        let inner = &self.inner;
        let mut backoff = inner.config.backoff();

        while !inner.closed.is_triggered() {
            if inner.buffer.is_full() {
                // High-water mark: let callers drain before fetching more
                if !self.pause(inner.config.poll_interval()).await {
                    break;
                }
                continue;
            }

            let endpoint = match self.current_endpoint() {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    warn!("Listener {}/{} stopping: {}", inner.stream, inner.shard, e);
                    break;
                }
            };

            let result = tokio::select! {
                biased;
                _ = inner.closed.triggered() => break,
                result = endpoint.get() => result,
            };

            match result {
                Ok(batch) if batch.is_empty() => {
                    backoff.reset();
                    if !self.pause(inner.config.poll_interval()).await {
                        break;
                    }
                }
                Ok(batch) => {
                    backoff.reset();
                    let count = batch.len();
                    if let Err(e) = inner.buffer.extend_unchecked(batch) {
                        debug!("Listener {}/{} dropped batch: {}", inner.stream, inner.shard, e);
                        break;
                    }
                    inner
                        .received_count
                        .fetch_add(count as u64, Ordering::AcqRel);
                    debug!(
                        "Listener {}/{} buffered {} records",
                        inner.stream, inner.shard, count
                    );
                }
                Err(e) => {
                    inner.error_count.fetch_add(1, Ordering::AcqRel);
                    let delay = backoff.next_delay();
                    warn!("Listener {}, retrying in {:?}", e, delay);
                    let _ = inner.errors.send(e);
                    if !self.pause(delay).await {
                        break;
                    }
                }
            }
        }

        info!(
            "Listener {}/{} stopped ({} received, {} errors, {} buffered)",
            inner.stream,
            inner.shard,
            self.received_count(),
            self.error_count(),
            self.buffered()
        );
    }

    /// Sleep unless closed first; false means the loop should exit
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.inner.closed.triggered() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Wait for and remove the oldest buffered message
    ///
    /// Fails with `Closed` once the listener is closed and its buffer is
    /// empty. Cancel-safe.
    pub async fn retrieve(&self) -> StreamResult<Message> {
        self.inner.buffer.pop_wait().await
    }

    /// Take the oldest buffered message without waiting
    pub fn try_retrieve(&self) -> StreamResult<Option<Message>> {
        match self.inner.buffer.try_pop()? {
            Some(message) => Ok(Some(message)),
            None if self.is_closed() => Err(StreamError::Closed {
                component: COMPONENT,
            }),
            None => Ok(None),
        }
    }

    /// `retrieve` with a deadline; `Ok(None)` if nothing arrived in time
    pub async fn retrieve_timeout(&self, duration: Duration) -> StreamResult<Option<Message>> {
        match tokio::time::timeout(duration, self.retrieve()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Messages in arrival order, ending once the listener is closed and drained
    pub fn messages(&self) -> BoxStream<'static, Message> {
        stream::unfold(self.clone(), |listener| async move {
            match listener.retrieve().await {
                Ok(message) => Some((message, listener)),
                Err(e) => {
                    if !e.is_closed() {
                        warn!("Listener message stream ended: {}", e);
                    }
                    None
                }
            }
        })
        .boxed()
    }

    /// Hand each message to `handler` until the listener is closed and drained
    ///
    /// Returns the number of messages handled.
    pub async fn listen<F, Fut>(&self, mut handler: F) -> StreamResult<u64>
    where
        F: FnMut(Message) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut handled = 0;
        loop {
            match self.retrieve().await {
                Ok(message) => {
                    handler(message).await;
                    handled += 1;
                }
                Err(e) if e.is_closed() => return Ok(handled),
                Err(e) => return Err(e),
            }
        }
    }

    /// Stop the pull loop and release the endpoint; a no-op the second time
    pub async fn close(&self) -> StreamResult<()> {
        if !self.inner.closed.trigger() {
            debug!(
                "Listener {}/{} already closed",
                self.inner.stream, self.inner.shard
            );
            return Ok(());
        }

        self.inner.buffer.close();
        self.wait_stopped().await;

        {
            let mut slot = handle_rwlock_write(self.inner.endpoint.write(), |message| {
                StreamError::Internal { message }
            })?;
            *slot = None;
        }

        info!(
            "Listener {}/{} closed",
            self.inner.stream, self.inner.shard
        );
        Ok(())
    }

    pub async fn wait_stopped(&self) {
        self.inner.state.wait_stopped().await;
    }

    pub fn is_consuming(&self) -> bool {
        self.inner.state.is_running()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_triggered()
    }

    /// Get failures since creation; never decreases
    pub fn error_count(&self) -> u64 {
        self.inner.error_count.load(Ordering::Acquire)
    }

    pub fn received_count(&self) -> u64 {
        self.inner.received_count.load(Ordering::Acquire)
    }

    pub fn buffered(&self) -> usize {
        self.inner.buffer.len()
    }

    /// Subscribe to get failures published from now on
    pub fn errors(&self) -> broadcast::Receiver<TransportError> {
        self.inner.errors.subscribe()
    }

    pub fn stream_name(&self) -> &str {
        &self.inner.stream
    }

    pub fn shard_id(&self) -> &str {
        &self.inner.shard
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.inner.config
    }
}
