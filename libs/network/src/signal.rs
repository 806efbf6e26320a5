//! Wake signals for idle workers.
//!
//! A [`WakeSignal`] listens for small multipart messages telling a worker
//! that new work was enqueued. Only the first frame is passed on; callers
//! treat an empty first frame as a spurious signal.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::transports::{BoxedWrite, Connection, Listener, MultipartWriter, DEFAULT_MAX_MESSAGE_SIZE};
use codec::Frame;

const SIGNAL_BACKLOG: usize = 64;
const SIGNAL_MAX_SIZE: usize = 64 * 1024;

pub struct WakeSignal {
    rx: mpsc::Receiver<Bytes>,
    endpoint: Option<Endpoint>,
    acceptor: Option<JoinHandle<()>>,
}

impl WakeSignal {
    /// Bind a listener on `endpoint` and start accepting signal senders
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        let listener = Listener::bind(endpoint).await?;
        let local = listener.local_endpoint()?;
        let (tx, rx) = mpsc::channel(SIGNAL_BACKLOG);

        let acceptor = tokio::spawn(async move {
            loop {
                let (connection, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "wake signal accept failed");
                        continue;
                    }
                };
                debug!(peer = %peer, "wake signal sender connected");
                let tx = tx.clone();
                tokio::spawn(async move {
                    let (mut reader, _writer) = connection.into_multipart(SIGNAL_MAX_SIZE);
                    while let Ok(Some(frames)) = reader.recv().await {
                        let first = frames.into_iter().next().map(Frame::into_bytes);
                        if tx.send(first.unwrap_or_default()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        info!(endpoint = %local, "wake signal listening");
        Ok(Self {
            rx,
            endpoint: Some(local),
            acceptor: Some(acceptor),
        })
    }

    /// In-process signal pair, for embedding and tests
    pub fn channel() -> (LocalSignalSender, WakeSignal) {
        let (tx, rx) = mpsc::channel(SIGNAL_BACKLOG);
        (
            LocalSignalSender { tx },
            WakeSignal {
                rx,
                endpoint: None,
                acceptor: None,
            },
        )
    }

    /// Wait for the next signal; `None` when no sender can reach us any more
    pub async fn wait(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Endpoint the listener is bound to (resolves TCP port 0)
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }
}

impl Drop for WakeSignal {
    fn drop(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
    }
}

#[derive(Clone)]
pub struct LocalSignalSender {
    tx: mpsc::Sender<Bytes>,
}

impl LocalSignalSender {
    pub async fn send(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.tx
            .send(payload.into())
            .await
            .map_err(|_| TransportError::channel_closed("wake signal"))
    }
}

/// Socket client that pokes a remote [`WakeSignal`]
pub struct SignalSender {
    writer: MultipartWriter<BoxedWrite>,
}

impl SignalSender {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        let (_reader, writer) = Connection::connect(endpoint)
            .await?
            .into_multipart(DEFAULT_MAX_MESSAGE_SIZE);
        Ok(Self { writer })
    }

    pub async fn send(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        self.writer.send(&[Frame::from(payload.into())]).await
    }
}
