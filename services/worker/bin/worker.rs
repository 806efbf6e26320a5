//! Worker service binary
//!
//! Usage:
//!   worker --config config/worker.toml
//!   BUCKETS_WORKER__PUBLISH_ENDPOINT=tcp://*:9999 worker

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use forwarder::{ForwarderBridge, ForwarderConfig};
use network::WakeSignal;
use tokio::sync::watch;
use tracing::{error, info};
use worker::{init_logging, DispatcherConfig, SpoolQueue, WorkQueue, WorkerDispatcher};
use worker_config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "worker")]
#[command(about = "Bucket puzzle worker: solves queued jobs and streams every step")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    let settings = load_settings(args.config.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {e:#}");
        e
    })?;
    let worker_settings = &settings.worker;

    let queue = SpoolQueue::open(&worker_settings.queue_dir, &worker_settings.queue_name)
        .await
        .context("Failed to open work queue")?;
    let dead_letter = match &worker_settings.dead_letter_queue {
        Some(name) => Some(
            SpoolQueue::open(&worker_settings.queue_dir, name)
                .await
                .context("Failed to open dead-letter queue")?,
        ),
        None => None,
    };

    let forwarder = ForwarderBridge::start(
        ForwarderConfig::new(worker_settings.publish_endpoint()?)
            .with_max_message_size(worker_settings.max_message_size),
    )
    .await
    .context("Failed to start forwarder")?;
    info!(endpoint = %forwarder.backend_endpoint(), "publishing updates");

    let mut dispatcher = WorkerDispatcher::new(
        Arc::new(queue),
        forwarder.connector().clone(),
        DispatcherConfig::from(worker_settings),
    );
    if let Some(dead_letter) = dead_letter {
        dispatcher = dispatcher.with_dead_letter(Arc::new(dead_letter) as Arc<dyn WorkQueue>);
    }
    if let Some(endpoint) = worker_settings.signal_endpoint()? {
        let wake = WakeSignal::bind(&endpoint)
            .await
            .context("Failed to bind wake signal")?;
        info!(endpoint = %endpoint, "listening for wake signals");
        dispatcher = dispatcher.with_wake_signal(wake);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for CTRL+C: {e}"),
        }
        let _ = shutdown_tx.send(true);
    });

    info!(queue = %worker_settings.queue_name, "worker started");
    let result = dispatcher.run(shutdown_rx).await;

    drop(dispatcher);
    forwarder.stop();
    result.context("Worker loop failed")
}
