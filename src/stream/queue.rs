//! In-process FIFO buffer shared between a background loop and callers
//!
//! The producer queues outgoing messages here for its pump; the listener
//! buffers pulled records here for `retrieve`. Entries sit behind a std
//! mutex that is never held across an await. A `Notify` wakes tasks blocked
//! in `pop_wait`.
//!
//! Closing a queue rejects further pushes but keeps what is already queued,
//! so waiters drain the remaining entries before they see `Closed`.

use crate::core::sync::handle_mutex_poison;
use crate::stream::error::{StreamError, StreamResult};
use crate::stream::message::Message;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug)]
pub struct MessageQueue {
    entries: Mutex<VecDeque<Message>>,
    /// `None` means unbounded
    capacity: Option<usize>,
    closed: AtomicBool,
    notify: Notify,
    component: &'static str,
}

impl MessageQueue {
    pub fn new(component: &'static str, capacity: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
            closed: AtomicBool::new(false),
            notify: Notify::new(),
            component,
        }
    }

    pub fn unbounded(component: &'static str) -> Self {
        Self::new(component, None)
    }

    fn lock(&self) -> StreamResult<MutexGuard<'_, VecDeque<Message>>> {
        handle_mutex_poison(self.entries.lock(), |message| StreamError::Internal {
            message,
        })
    }

    /// Append a message, failing if closed or at capacity
    pub fn push(&self, message: Message) -> StreamResult<()> {
        self.push_all(vec![message])
    }

    /// Append messages atomically: either all fit or none are queued
    pub fn push_all(&self, messages: Vec<Message>) -> StreamResult<()> {
        if messages.is_empty() {
            return Ok(());
        }

        {
            let mut entries = self.lock()?;
            // Checked under the lock so close() cannot interleave with the append
            if self.is_closed() {
                return Err(StreamError::Closed {
                    component: self.component,
                });
            }
            if let Some(max_size) = self.capacity {
                if entries.len() + messages.len() > max_size {
                    return Err(StreamError::QueueFull { max_size });
                }
            }
            entries.extend(messages);
        }

        self.notify.notify_one();
        Ok(())
    }

    /// Append messages ignoring capacity; callers use capacity as a high-water mark
    pub(crate) fn extend_unchecked(&self, messages: Vec<Message>) -> StreamResult<()> {
        {
            let mut entries = self.lock()?;
            if self.is_closed() {
                return Err(StreamError::Closed {
                    component: self.component,
                });
            }
            entries.extend(messages);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Remove the oldest message, if any
    pub fn try_pop(&self) -> StreamResult<Option<Message>> {
        let (message, more) = {
            let mut entries = self.lock()?;
            let message = entries.pop_front();
            (message, !entries.is_empty())
        };

        // Pass the wakeup on so other waiters see the rest of a batch
        if message.is_some() && more {
            self.notify.notify_one();
        }
        Ok(message)
    }

    /// Wait for and remove the oldest message
    ///
    /// Returns `Closed` once the queue is closed and empty. Cancel-safe: a
    /// message is only removed when this future completes.
    pub async fn pop_wait(&self) -> StreamResult<Message> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a push between the check and the await is not lost
            notified.as_mut().enable();

            if let Some(message) = self.try_pop()? {
                return Ok(message);
            }
            if self.is_closed() {
                return Err(StreamError::Closed {
                    component: self.component,
                });
            }

            notified.await;
        }
    }

    /// Reject further pushes and wake every waiter
    pub fn close(&self) {
        // Take the lock so no push is halfway through its closed check
        let _guard = self.entries.lock();
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of queued messages (0 if the lock is poisoned)
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.capacity
            .map(|max_size| self.len() >= max_size)
            .unwrap_or(false)
    }
}
