//! Application startup and the send-then-retrieve run
//!
//! Stage 1 parses arguments and loads the configuration file. Stage 2 starts
//! logging with the merged settings. Stage 3 wires a Producer and a Listener
//! to one shard of an in-memory stream, sends the requested messages and
//! prints each one as the Listener retrieves it.

use super::args::Args;
use super::config::AppConfig;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::version::long_version;
use crate::stream::api::{Listener, MemoryStreamService, Message, Producer, StreamResult};
use clap::Parser;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

/// Exit status after SIGINT/SIGTERM, as a shell reports it
const EXIT_INTERRUPTED: i32 = 130;

/// What a pipeline run achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub sent: usize,
    pub received: usize,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            EXIT_INTERRUPTED
        } else if self.received < self.sent {
            1
        } else {
            0
        }
    }
}

/// Initialize application startup
pub fn startup() {
    #[cfg(unix)]
    unsafe {
        // Exit quietly when stdout is a closed pipe (e.g. `kinetic ... | head -1`)
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start the async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = runtime.block_on(run(args));
    std::process::exit(code);
}

/// Run the binary with parsed arguments and return the process exit status
pub async fn run(args: Args) -> i32 {
    // Stage 1: configuration
    let mut config = match AppConfig::load(args.config_file.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    config.apply_args(&args);
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return 1;
    }

    // Stage 2: logging
    let use_color = config
        .logging
        .color
        .unwrap_or_else(|| std::io::IsTerminal::is_terminal(&std::io::stderr()));
    if let Err(e) = init_logging(
        config.logging.level.as_deref(),
        config.logging.format.as_deref(),
        config.logging.file.as_deref(),
        use_color,
    ) {
        eprintln!("Warning: logging not initialised: {}", e);
    }
    info!("kinetic {} starting", long_version());

    // Stage 3: pipeline
    let mut messages = args.messages.clone();
    if args.stdin {
        match read_stdin_lines().await {
            Ok(lines) => messages.extend(lines),
            Err(e) => {
                log::error!("FATAL: could not read standard input: {}", e);
                return 1;
            }
        }
    }

    let (coordinator, shutdown_rx) = ShutdownCoordinator::new();
    coordinator.install_signal_handlers();

    match run_pipeline(
        &config,
        &args.partition_key,
        messages,
        Duration::from_millis(args.timeout_ms),
        shutdown_rx,
    )
    .await
    {
        Ok(summary) => {
            if summary.received < summary.sent && !summary.interrupted {
                warn!(
                    "Only {} of {} messages were retrieved before the timeout",
                    summary.received, summary.sent
                );
            }
            summary.exit_code()
        }
        Err(e) => {
            log_error_with_context(&e, "Running the stream pipeline");
            1
        }
    }
}

async fn read_stdin_lines() -> std::io::Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut messages = Vec::new();
    while let Some(line) = lines.next_line().await? {
        messages.push(line);
    }
    Ok(messages)
}

/// Send `messages` through a fresh in-memory stream and print what comes back
///
/// Stops when every message has been retrieved, when `timeout` elapses, or
/// when a shutdown is requested, then closes both ends.
pub async fn run_pipeline(
    config: &AppConfig,
    partition_key: &str,
    messages: Vec<String>,
    timeout: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> StreamResult<RunSummary> {
    let stream = config.stream.name.as_str();
    let shard = config.stream.shard.as_str();
    let service = MemoryStreamService::new();

    let producer = Producer::new(stream, shard, config.producer.clone())?;
    producer.set_endpoint(service.endpoint(stream, shard))?;

    let listener = Listener::new(stream, shard, config.listener.clone())?;
    listener.set_endpoint(service.endpoint_at(stream, shard, config.stream.start_position))?;

    exchange(
        &producer,
        &listener,
        partition_key,
        messages,
        timeout,
        &mut shutdown_rx,
    )
    .await
}

/// Run the send/retrieve loop over wired ends and close both, even on error
async fn exchange(
    producer: &Producer,
    listener: &Listener,
    partition_key: &str,
    messages: Vec<String>,
    timeout: Duration,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> StreamResult<RunSummary> {
    let outcome = transfer(
        producer,
        listener,
        partition_key,
        messages,
        timeout,
        shutdown_rx,
    )
    .await;

    let producer_closed = producer.close().await;
    let listener_closed = listener.close().await;
    let summary = outcome?;
    producer_closed?;
    listener_closed?;

    info!(
        "{} sent, {} received, {} put errors, {} get errors",
        producer.sent_count(),
        summary.received,
        producer.error_count(),
        listener.error_count()
    );
    Ok(summary)
}

async fn transfer(
    producer: &Producer,
    listener: &Listener,
    partition_key: &str,
    messages: Vec<String>,
    timeout: Duration,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> StreamResult<RunSummary> {
    listener.start()?;
    producer.start()?;

    let mut summary = RunSummary {
        sent: messages.len(),
        received: 0,
        interrupted: false,
    };
    producer.send_batch(
        messages
            .into_iter()
            .map(|value| Message::new(value, partition_key))
            .collect(),
    )?;

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    while summary.received < summary.sent {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                summary.interrupted = true;
                break;
            }
            _ = &mut deadline => break,
            message = listener.retrieve() => {
                let message = message?;
                debug!(
                    "Retrieved sequence number {}",
                    message.sequence_number().unwrap_or("-")
                );
                println!("{}", message.value_str());
                summary.received += 1;
            }
        }
    }
    Ok(summary)
}
