//! Running flag shared by a background loop and its owner
//!
//! The flag is a `watch` channel rather than a bare `AtomicBool` so that
//! `wait_stopped` can await the running -> stopped transition instead of
//! polling `is_running` in a loop.

use tokio::sync::watch;

#[derive(Debug)]
pub(crate) struct LoopState {
    running: watch::Sender<bool>,
}

impl LoopState {
    pub fn new() -> Self {
        let (running, _) = watch::channel(false);
        Self { running }
    }

    /// Flip stopped -> running; false if a loop is already running
    pub fn try_start(&self) -> bool {
        self.running.send_if_modified(|running| {
            if *running {
                false
            } else {
                *running = true;
                true
            }
        })
    }

    pub fn stop(&self) {
        self.running.send_if_modified(|running| std::mem::replace(running, false));
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Resolve once the flag reads stopped
    pub async fn wait_stopped(&self) {
        let mut rx = self.running.subscribe();
        // The sender lives in self, so the channel cannot close under us
        let _ = rx.wait_for(|running| !*running).await;
    }

    /// Guard that stops the loop when dropped, including on panic or cancellation
    pub fn guard(&self) -> RunningGuard<'_> {
        RunningGuard { state: self }
    }
}

pub(crate) struct RunningGuard<'a> {
    state: &'a LoopState,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.state.stop();
    }
}

/// One-way stop request for loops without an interrupt channel
#[derive(Debug)]
pub(crate) struct StopSignal {
    stopped: watch::Sender<bool>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (stopped, _) = watch::channel(false);
        Self { stopped }
    }

    /// Request the stop; false if it was already requested
    pub fn trigger(&self) -> bool {
        self.stopped
            .send_if_modified(|stopped| !std::mem::replace(stopped, true))
    }

    pub fn is_triggered(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Resolve once a stop has been requested
    pub async fn triggered(&self) {
        let mut rx = self.stopped.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}
