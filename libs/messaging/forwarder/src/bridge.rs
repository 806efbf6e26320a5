//! Forwarder bridge: in-process frontend, socket backend.
//!
//! The bridge runs on a dedicated OS thread with its own tokio runtime so
//! relaying never competes with the dispatcher's tasks. Startup binds the
//! backend inside that thread and reports the outcome back, so a bind
//! failure surfaces from [`ForwarderBridge::start`].

use std::thread::JoinHandle;

use network::{inproc, Endpoint, InprocConnector, InprocReceiver, Listener, Publisher, TransportError};
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::client::{handle_connection, ClientManager, ForwarderStats};
use crate::config::ForwarderConfig;

pub struct ForwarderBridge;

impl ForwarderBridge {
    pub async fn start(config: ForwarderConfig) -> Result<ForwarderHandle, TransportError> {
        config.validate()?;

        let (connector, frontend) = inproc::channel(config.frontend_capacity);
        let manager = ClientManager::new(config.broadcast_capacity);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let thread = {
            let manager = manager.clone();
            std::thread::Builder::new()
                .name("forwarder".to_string())
                .spawn(move || {
                    let runtime = match tokio::runtime::Builder::new_multi_thread()
                        .worker_threads(config.worker_threads)
                        .thread_name("forwarder-io")
                        .enable_all()
                        .build()
                    {
                        Ok(runtime) => runtime,
                        Err(e) => {
                            let _ = ready_tx.send(Err(TransportError::io(
                                "Failed to build forwarder runtime",
                                e,
                            )));
                            return;
                        }
                    };
                    runtime.block_on(serve(config, frontend, manager, ready_tx, shutdown_rx));
                })
                .map_err(|e| TransportError::io("Failed to spawn forwarder thread", e))?
        };

        let backend = match ready_rx.await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(TransportError::channel_closed("forwarder startup"));
            }
        };

        Ok(ForwarderHandle {
            connector,
            backend,
            manager,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

async fn serve(
    config: ForwarderConfig,
    mut frontend: InprocReceiver,
    manager: ClientManager,
    ready: oneshot::Sender<Result<Endpoint, TransportError>>,
    shutdown: oneshot::Receiver<()>,
) {
    let listener = match Listener::bind(&config.backend).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(endpoint = %config.backend, error = %e, "forwarder backend bind failed");
            let _ = ready.send(Err(e));
            return;
        }
    };
    let endpoint = match listener.local_endpoint() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    info!(backend = %endpoint, "forwarder started");
    if ready.send(Ok(endpoint)).is_err() {
        return;
    }

    let pump = async {
        while let Some(frames) = frontend.recv().await {
            manager.relay(frames);
        }
    };

    tokio::select! {
        _ = accept_loop(&listener, &manager, config.max_message_size) => {}
        _ = pump => info!("forwarder frontend closed"),
        _ = shutdown => info!("forwarder shutdown requested"),
    }

    let stats = manager.stats();
    info!(
        relayed = stats.relayed,
        dropped = stats.dropped,
        connections = stats.connections,
        "forwarder stopped"
    );
}

async fn accept_loop(listener: &Listener, manager: &ClientManager, max_message_size: usize) {
    loop {
        match listener.accept().await {
            Ok((connection, peer)) => {
                tokio::spawn(handle_connection(
                    connection,
                    peer,
                    manager.clone(),
                    max_message_size,
                ));
            }
            Err(e) => error!(error = %e, "failed to accept subscriber"),
        }
    }
}

/// Running forwarder. Dropping the handle stops it.
pub struct ForwarderHandle {
    connector: InprocConnector,
    backend: Endpoint,
    manager: ClientManager,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ForwarderHandle {
    /// Connector producers use to obtain their own [`Publisher`]
    pub fn connector(&self) -> &InprocConnector {
        &self.connector
    }

    pub fn publisher(&self) -> Publisher {
        self.connector.connect()
    }

    /// Endpoint subscribers connect to; TCP port 0 is resolved
    pub fn backend_endpoint(&self) -> &Endpoint {
        &self.backend
    }

    pub fn stats(&self) -> ForwarderStats {
        self.manager.stats()
    }

    /// Stop relaying, close every subscriber connection and join the thread
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("forwarder thread panicked");
            }
        }
    }
}

impl Drop for ForwarderHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
