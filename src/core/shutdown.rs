//! Signal-driven shutdown
//!
//! `wait_for_signal` resolves on the first SIGINT or SIGTERM (ctrl-c on
//! non-unix targets). The producer's pump selects on it directly; the binary
//! wraps it in a `ShutdownCoordinator` so several tasks can observe one
//! shutdown request.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Which OS signal requested the shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Wait for the next SIGINT or SIGTERM
///
/// Handlers are registered on first poll, so a future that is never polled
/// leaves the default signal disposition untouched.
pub async fn wait_for_signal() -> ShutdownSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut interrupt), Ok(mut terminate)) => {
                tokio::select! {
                    _ = interrupt.recv() => ShutdownSignal::Interrupt,
                    _ = terminate.recv() => ShutdownSignal::Terminate,
                }
            }
            _ => {
                log::warn!("Could not register unix signal handlers, falling back to ctrl-c");
                ctrl_c().await
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await
    }
}

async fn ctrl_c() -> ShutdownSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for ctrl-c: {}", e);
        // Without a handler the signal can never be observed
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Interrupt
}

/// Fans a single shutdown request out to any number of tasks
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> (Self, broadcast::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(8);
        let coordinator = Self {
            shutdown_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        };
        (coordinator, shutdown_rx)
    }

    /// Subscribe to shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Spawn a task that triggers shutdown on the first OS signal
    ///
    /// A second signal exits the process immediately with status 130.
    pub fn install_signal_handlers(&self) {
        let tx = self.shutdown_tx.clone();
        let requested = self.shutdown_requested.clone();

        tokio::spawn(async move {
            let signal = wait_for_signal().await;
            log::info!("{} received, shutting down", signal);
            requested.store(true, Ordering::Release);
            let _ = tx.send(());

            let signal = wait_for_signal().await;
            log::warn!("{} received again; exiting", signal);
            std::process::exit(130);
        });
    }
}
