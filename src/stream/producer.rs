//! Producer
//!
//! Accepts messages from any number of tasks and forwards them, oldest
//! first, to the bound endpoint from a single pump loop.
//!
//! The pump stops on an interrupt, on `close()`, or (with `stop_on_signal`)
//! on SIGINT/SIGTERM. Put failures never stop it: each one is counted and
//! published on the producer's error channel, and the pump moves on to the
//! next message.

use crate::core::retry::retry_async;
use crate::core::shutdown::wait_for_signal;
use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use crate::stream::config::{validate_identifiers, ProducerConfig};
use crate::stream::endpoint::Endpoint;
use crate::stream::error::{StreamError, StreamResult, TransportError};
use crate::stream::lifecycle::LoopState;
use crate::stream::message::Message;
use crate::stream::queue::MessageQueue;
use log::{debug, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

const COMPONENT: &str = "producer";
const INTERRUPT_CHANNEL_CAPACITY: usize = 8;

/// Request posted on a producer's interrupt channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Stop the pump; the producer may be started again
    Stop,
    /// Stop the pump because the producer is closing
    Close,
}

/// An interrupt tagged with the pump run it was posted to
#[derive(Debug, Clone, Copy)]
struct Posted {
    run: u64,
    interrupt: Interrupt,
}

struct ProducerInner {
    stream: String,
    shard: String,
    config: ProducerConfig,
    endpoint: RwLock<Option<Arc<dyn Endpoint>>>,
    queue: MessageQueue,
    state: LoopState,
    error_count: AtomicU64,
    sent_count: AtomicU64,
    /// Incremented each time a pump starts
    run: AtomicU64,
    interrupts_tx: mpsc::Sender<Posted>,
    /// Held by the running pump for its whole lifetime
    interrupts_rx: Mutex<mpsc::Receiver<Posted>>,
    errors: broadcast::Sender<TransportError>,
    closed: AtomicBool,
}

/// Handle to a producer; clones share the same queue and pump
///
/// # Example
///
/// ```rust
/// use kinetic::stream::{MemoryStreamService, Message, Producer, ProducerConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let service = MemoryStreamService::new();
/// let producer = Producer::new("orders", "shard-0", ProducerConfig::default())?;
/// producer.set_endpoint(service.endpoint("orders", "shard-0"))?;
///
/// producer.send(Message::new("hello", "test"))?;
/// producer.start()?;
/// producer.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Producer {
    inner: Arc<ProducerInner>,
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("stream", &self.inner.stream)
            .field("shard", &self.inner.shard)
            .field("producing", &self.is_producing())
            .field("pending", &self.pending())
            .field("error_count", &self.error_count())
            .finish()
    }
}

impl Producer {
    /// Create a stopped producer for one stream shard
    ///
    /// Fails with `StreamError::Config` if the identifiers or the config
    /// are invalid.
    pub fn new(stream: &str, shard: &str, config: ProducerConfig) -> StreamResult<Self> {
        validate_identifiers(stream, shard)?;
        config.validate()?;

        let (interrupts_tx, interrupts_rx) = mpsc::channel(INTERRUPT_CHANNEL_CAPACITY);
        let (errors, _) = broadcast::channel(config.error_channel_capacity);

        Ok(Self {
            inner: Arc::new(ProducerInner {
                stream: stream.to_string(),
                shard: shard.to_string(),
                queue: MessageQueue::new(COMPONENT, config.queue_capacity),
                config,
                endpoint: RwLock::new(None),
                state: LoopState::new(),
                error_count: AtomicU64::new(0),
                sent_count: AtomicU64::new(0),
                run: AtomicU64::new(0),
                interrupts_tx,
                interrupts_rx: Mutex::new(interrupts_rx),
                errors,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Bind or replace the endpoint puts go through
    ///
    /// A running pump picks up the new endpoint from its next message on.
    pub fn set_endpoint(&self, endpoint: impl Endpoint + 'static) -> StreamResult<()> {
        self.set_shared_endpoint(Arc::new(endpoint))
    }

    pub fn set_shared_endpoint(&self, endpoint: Arc<dyn Endpoint>) -> StreamResult<()> {
        if self.is_closed() {
            return Err(StreamError::Closed {
                component: COMPONENT,
            });
        }
        if endpoint.stream_name() != self.inner.stream || endpoint.shard_id() != self.inner.shard
        {
            return Err(StreamError::config(format!(
                "endpoint is bound to {}/{}, producer to {}/{}",
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
        debug!(
            "Producer {}/{} endpoint bound",
            self.inner.stream, self.inner.shard
        );
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

    /// Queue a message for the pump
    ///
    /// Never touches the network. Fails with `Closed` after `close()` and
    /// with `QueueFull` when a bounded queue has no room.
    pub fn send(&self, message: Message) -> StreamResult<()> {
        self.ensure_open()?;
        debug!(
            "Queueing {} byte message with partition key '{}'",
            message.len(),
            message.partition_key()
        );
        self.inner.queue.push(message)
    }

    /// Queue several messages in order; either all are queued or none
    pub fn send_batch(&self, messages: Vec<Message>) -> StreamResult<()> {
        self.ensure_open()?;
        debug!("Queueing batch of {} messages", messages.len());
        self.inner.queue.push_all(messages)
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

    /// Claim the running flag for a new pump and return its run number
    fn begin(&self) -> StreamResult<u64> {
        self.ensure_open()?;
        self.current_endpoint()?;
        if !self.inner.state.try_start() {
            return Err(StreamError::AlreadyRunning {
                component: COMPONENT,
            });
        }
        let run = self.inner.run.fetch_add(1, Ordering::AcqRel) + 1;
        info!(
            "Producer {}/{} started (run {})",
            self.inner.stream, self.inner.shard, run
        );
        Ok(run)
    }

    /// Run the pump on the current task until interrupted or closed
    pub async fn produce(&self) -> StreamResult<()> {
        let run = self.begin()?;
        self.pump(run).await;
        Ok(())
    }

    /// Spawn the pump; `is_producing()` is true when this returns
    pub fn start(&self) -> StreamResult<JoinHandle<()>> {
        let run = self.begin()?;
        let producer = self.clone();
        Ok(tokio::spawn(async move { producer.pump(run).await }))
    }

    /// The running flag is cleared when this returns or is dropped
    async fn pump(&self, run: u64) {
        let inner = &self.inner;
        let _running = inner.state.guard();
        let mut interrupts = inner.interrupts_rx.lock().await;

        let signal = wait_for_signal();
        tokio::pin!(signal);

        loop {
            if self.is_closed() {
                break;
            }

            let message = tokio::select! {
                biased;

                posted = interrupts.recv() => match posted {
                    // Left over from an earlier run
                    Some(posted) if posted.run < run => {
                        debug!("Producer {}/{} ignoring {:?}", inner.stream, inner.shard, posted);
                        continue;
                    }
                    posted => {
                        debug!("Producer {}/{} received {:?}", inner.stream, inner.shard, posted);
                        break;
                    }
                },
                received = &mut signal, if inner.config.stop_on_signal => {
                    info!("{} received, stopping producer {}/{}", received, inner.stream, inner.shard);
                    break;
                }
                next = inner.queue.pop_wait() => match next {
                    Ok(message) => message,
                    Err(e) if e.is_closed() => break,
                    Err(e) => {
                        warn!("Producer {}/{} queue failed: {}", inner.stream, inner.shard, e);
                        break;
                    }
                },
            };

            let endpoint = match self.current_endpoint() {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    warn!("Producer {}/{} stopping: {}", inner.stream, inner.shard, e);
                    break;
                }
            };
            self.forward(endpoint.as_ref(), &message).await;
        }

        while interrupts.try_recv().is_ok() {}

        info!(
            "Producer {}/{} stopped ({} sent, {} errors, {} pending)",
            inner.stream,
            inner.shard,
            self.sent_count(),
            self.error_count(),
            self.pending()
        );
    }

    async fn forward(&self, endpoint: &dyn Endpoint, message: &Message) {
        let inner = &self.inner;
        let result = retry_async("put", inner.config.put_retry_policy(), move || {
            endpoint.put(message)
        })
        .await;

        match result {
            Ok(()) => {
                inner.sent_count.fetch_add(1, Ordering::AcqRel);
                debug!(
                    "Put {} byte message to {}/{}",
                    message.len(),
                    inner.stream,
                    inner.shard
                );
            }
            Err(e) => {
                inner.error_count.fetch_add(1, Ordering::AcqRel);
                warn!("Producer {}", e);
                // No subscribers is not an error; the count above still records it
                let _ = inner.errors.send(e);
            }
        }
    }

    /// Ask a running pump to stop; a no-op when it is not running
    pub fn interrupt(&self) {
        post_interrupt(&self.inner, Interrupt::Stop);
    }

    /// Cloneable handle that can interrupt this producer from elsewhere
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Stop the pump and release the endpoint
    ///
    /// Waits for an in-flight put to finish. Messages still queued are
    /// dropped. Calling `close` again is a no-op.
    pub async fn close(&self) -> StreamResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!(
                "Producer {}/{} already closed",
                self.inner.stream, self.inner.shard
            );
            return Ok(());
        }

        let _ = self.inner.interrupts_tx.try_send(Posted {
            run: self.inner.run.load(Ordering::Acquire),
            interrupt: Interrupt::Close,
        });
        self.inner.queue.close();
        self.wait_stopped().await;

        {
            let mut slot = handle_rwlock_write(self.inner.endpoint.write(), |message| {
                StreamError::Internal { message }
            })?;
            *slot = None;
        }

        info!(
            "Producer {}/{} closed",
            self.inner.stream, self.inner.shard
        );
        Ok(())
    }

    /// Resolve once the pump is not running
    pub async fn wait_stopped(&self) {
        self.inner.state.wait_stopped().await;
    }

    pub fn is_producing(&self) -> bool {
        self.inner.state.is_running()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Put failures since creation; never decreases
    pub fn error_count(&self) -> u64 {
        self.inner.error_count.load(Ordering::Acquire)
    }

    pub fn sent_count(&self) -> u64 {
        self.inner.sent_count.load(Ordering::Acquire)
    }

    /// Messages queued but not yet taken by the pump
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    /// Subscribe to put failures published from now on
    pub fn errors(&self) -> broadcast::Receiver<TransportError> {
        self.inner.errors.subscribe()
    }

    pub fn stream_name(&self) -> &str {
        &self.inner.stream
    }

    pub fn shard_id(&self) -> &str {
        &self.inner.shard
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.inner.config
    }
}

fn post_interrupt(inner: &ProducerInner, interrupt: Interrupt) {
    // Read before the running check: a stop racing a restart targets the run it saw
    let run = inner.run.load(Ordering::Acquire);
    if !inner.state.is_running() {
        debug!(
            "Producer {}/{} not running, ignoring {:?}",
            inner.stream, inner.shard, interrupt
        );
        return;
    }
    if let Err(e) = inner.interrupts_tx.try_send(Posted { run, interrupt }) {
        // A full channel already holds a pending stop
        debug!(
            "Producer {}/{} interrupt not posted: {}",
            inner.stream, inner.shard, e
        );
    }
}

/// Interrupts a producer without keeping it alive
#[derive(Clone)]
pub struct InterruptHandle {
    inner: Weak<ProducerInner>,
}

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl InterruptHandle {
    /// Ask the producer's pump to stop; a no-op if it is gone or not running
    pub fn interrupt(&self) {
        if let Some(inner) = self.inner.upgrade() {
            post_interrupt(&inner, Interrupt::Stop);
        }
    }
}
