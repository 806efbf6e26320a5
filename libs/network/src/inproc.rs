//! In-process publish channel.
//!
//! The receiving end is owned by the relay; producers get their own
//! [`Publisher`] from a cloneable [`InprocConnector`]. A `Publisher` is
//! `Send` so it can move into the task that owns it, but it is neither
//! `Sync` nor `Clone`: one connection belongs to exactly one producer.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use codec::Frame;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, TransportError};

/// Create the channel; `capacity` bounds messages in flight to the relay
pub fn channel(capacity: usize) -> (InprocConnector, InprocReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        InprocConnector {
            tx,
            next_id: Arc::new(AtomicU64::new(0)),
        },
        InprocReceiver { rx },
    )
}

/// Hands out publisher connections; cheap to clone
#[derive(Clone)]
pub struct InprocConnector {
    tx: mpsc::Sender<Vec<Frame>>,
    next_id: Arc<AtomicU64>,
}

impl InprocConnector {
    /// Open a new private connection
    pub fn connect(&self) -> Publisher {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(publisher = id, "inproc publisher connected");
        Publisher {
            tx: self.tx.clone(),
            id,
            sent: 0,
            _not_sync: PhantomData,
        }
    }

    /// True once the relay has dropped its receiver
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single-owner publishing connection
pub struct Publisher {
    tx: mpsc::Sender<Vec<Frame>>,
    id: u64,
    sent: u64,
    _not_sync: PhantomData<Cell<()>>,
}

impl Publisher {
    /// Queue one multipart message for the relay. Waits while the channel is
    /// full; fails only if the relay is gone.
    pub async fn send(&mut self, frames: Vec<Frame>) -> Result<()> {
        self.tx
            .send(frames)
            .await
            .map_err(|_| TransportError::channel_closed("inproc publisher"))?;
        self.sent += 1;
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Messages sent on this connection
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        debug!(publisher = self.id, sent = self.sent, "inproc publisher closed");
    }
}

/// Relay side of the channel
pub struct InprocReceiver {
    rx: mpsc::Receiver<Vec<Frame>>,
}

impl InprocReceiver {
    /// Next message from any publisher. `None` once every connector and
    /// publisher has been dropped.
    pub async fn recv(&mut self) -> Option<Vec<Frame>> {
        self.rx.recv().await
    }

    /// Next queued message without waiting
    pub fn try_recv(&mut self) -> Option<Vec<Frame>> {
        self.rx.try_recv().ok()
    }

    pub fn close(&mut self) {
        self.rx.close();
    }
}
