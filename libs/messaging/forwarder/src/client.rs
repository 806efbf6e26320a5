//! # Subscriber Connection Management
//!
//! Every backend connection gets a read task and a write task:
//!
//! - **Read task**: receives subscription commands and updates the
//!   connection's [`TopicFilter`]
//! - **Write task**: receives relayed messages from the broadcast channel and
//!   writes the ones whose first frame matches the filter
//!
//! A write task that falls more than the broadcast capacity behind loses the
//! oldest messages, terminal updates included, and picks up at the oldest
//! one still buffered. Those losses are counted in [`ForwarderStats::lagged`].
//!
//! The connection is removed from the registry when either task finishes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use codec::Frame;
use dashmap::DashMap;
use network::{Connection, SubscriptionCommand, TopicFilter};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Unique identifier for subscriber connections
pub type ConnectionId = u64;

/// Message as it travels through the broadcast channel
pub type SharedMessage = Arc<Vec<Frame>>;

struct ConnectionEntry {
    peer: String,
    connected_at: Instant,
    filter: Arc<RwLock<TopicFilter>>,
}

/// Point-in-time relay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    /// Open subscriber connections
    pub connections: usize,
    /// Distinct prefixes summed over all connections
    pub subscriptions: usize,
    /// Messages handed to at least one subscriber
    pub relayed: u64,
    /// Messages no subscriber wanted
    pub dropped: u64,
    /// Messages skipped by subscribers that fell behind, summed over
    /// connections
    pub lagged: u64,
}

/// Tracks subscriber connections and fans messages out to them
#[derive(Clone)]
pub struct ClientManager {
    message_tx: broadcast::Sender<SharedMessage>,
    connection_counter: Arc<AtomicU64>,
    connections: Arc<DashMap<ConnectionId, ConnectionEntry>>,
    relayed: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    lagged: Arc<AtomicU64>,
}

impl ClientManager {
    pub fn new(broadcast_capacity: usize) -> Self {
        let (message_tx, _) = broadcast::channel(broadcast_capacity);
        Self {
            message_tx,
            connection_counter: Arc::new(AtomicU64::new(0)),
            connections: Arc::new(DashMap::new()),
            relayed: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            lagged: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a connection; returns its id and the filter its tasks share
    pub fn add_connection(&self, peer: &str) -> (ConnectionId, Arc<RwLock<TopicFilter>>) {
        let id = self.connection_counter.fetch_add(1, Ordering::SeqCst);
        let filter = Arc::new(RwLock::new(TopicFilter::new()));
        self.connections.insert(
            id,
            ConnectionEntry {
                peer: peer.to_string(),
                connected_at: Instant::now(),
                filter: filter.clone(),
            },
        );
        (id, filter)
    }

    pub fn remove_connection(&self, id: ConnectionId) {
        if let Some((_, entry)) = self.connections.remove(&id) {
            info!(
                connection = id,
                peer = %entry.peer,
                connected_for_ms = entry.connected_at.elapsed().as_millis() as u64,
                "subscriber disconnected"
            );
        }
    }

    /// True if any connection's filter accepts `topic`
    pub fn has_subscriber_for(&self, topic: &[u8]) -> bool {
        self.connections
            .iter()
            .any(|entry| entry.filter.read().matches(topic))
    }

    /// Hand a message to the write tasks. Returns false, and counts a drop,
    /// when nobody is subscribed to its topic.
    pub fn relay(&self, frames: Vec<Frame>) -> bool {
        if !self.has_subscriber_for(topic_of(&frames)) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        match self.message_tx.send(Arc::new(frames)) {
            Ok(_) => {
                self.relayed.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                // Subscriber left between the filter check and the send
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SharedMessage> {
        self.message_tx.subscribe()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn stats(&self) -> ForwarderStats {
        ForwarderStats {
            connections: self.connections.len(),
            subscriptions: self
                .connections
                .iter()
                .map(|entry| entry.filter.read().len())
                .sum(),
            relayed: self.relayed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            lagged: self.lagged.load(Ordering::Relaxed),
        }
    }
}

/// Next message for a write task, or `None` once the relay shuts down.
/// Lag is logged and counted, then reading resumes.
pub async fn next_relayed(
    manager: &ClientManager,
    message_rx: &mut broadcast::Receiver<SharedMessage>,
    connection_id: ConnectionId,
) -> Option<SharedMessage> {
    loop {
        match message_rx.recv().await {
            Ok(frames) => return Some(frames),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(connection = connection_id, skipped, "subscriber lagged, messages lost");
                manager.lagged.fetch_add(skipped, Ordering::Relaxed);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(connection = connection_id, "broadcast channel closed");
                return None;
            }
        }
    }
}

/// Topic of a message is its first frame; a message without frames has an empty topic
pub fn topic_of(frames: &[Frame]) -> &[u8] {
    frames.first().map(Frame::as_bytes).unwrap_or(&[])
}

/// Serve one subscriber connection until it closes or its writer fails
pub async fn handle_connection(
    connection: Connection,
    peer: String,
    manager: ClientManager,
    max_message_size: usize,
) {
    let (connection_id, filter) = manager.add_connection(&peer);
    info!(connection = connection_id, peer = %peer, "subscriber connected");

    let (mut reader, mut writer) = connection.into_multipart(max_message_size);
    // Subscribe before the read task can install a filter so nothing relayed
    // after a subscription is acknowledged can be missed
    let mut message_rx = manager.subscribe();

    let mut read_task = {
        let filter = filter.clone();
        tokio::spawn(async move {
            let mut commands = 0u64;
            loop {
                match reader.recv().await {
                    Ok(Some(frames)) => match SubscriptionCommand::parse(&frames) {
                        Some(command) => {
                            commands += 1;
                            let delta = filter.write().apply(&command);
                            debug!(connection = connection_id, ?command, delta, "subscription updated");
                        }
                        None => {
                            debug!(
                                connection = connection_id,
                                frames = frames.len(),
                                "ignoring non-subscription message from subscriber"
                            );
                        }
                    },
                    Ok(None) => {
                        debug!(connection = connection_id, "subscriber read stream closed");
                        break;
                    }
                    Err(e) => {
                        warn!(connection = connection_id, error = %e, "subscriber read error");
                        break;
                    }
                }
            }
            debug!(connection = connection_id, commands, "read task ended");
        })
    };

    let mut write_task = {
        let manager = manager.clone();
        tokio::spawn(async move {
            let mut write_count = 0u64;
            while let Some(frames) = next_relayed(&manager, &mut message_rx, connection_id).await {
                if !filter.read().matches(topic_of(&frames)) {
                    continue;
                }
                if let Err(e) = writer.send(&frames).await {
                    warn!(connection = connection_id, error = %e, "failed to write to subscriber");
                    break;
                }
                write_count += 1;
            }
            debug!(connection = connection_id, write_count, "write task ended");
        })
    };

    tokio::select! {
        _ = &mut read_task => write_task.abort(),
        _ = &mut write_task => read_task.abort(),
    }

    manager.remove_connection(connection_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_manager_accounting() {
        let manager = ClientManager::new(16);

        let (first, first_filter) = manager.add_connection("a");
        let (second, _) = manager.add_connection("b");
        assert_ne!(first, second);
        assert_eq!(manager.connection_count(), 2);

        first_filter
            .write()
            .apply(&SubscriptionCommand::Subscribe(b"3|5|".to_vec()));
        assert_eq!(manager.stats().subscriptions, 1);
        assert!(manager.has_subscriber_for(b"3|5|4|SmallToBig"));
        assert!(!manager.has_subscriber_for(b"5|3|4|BigToSmall"));

        manager.remove_connection(first);
        assert_eq!(manager.connection_count(), 1);
        assert_eq!(manager.stats().subscriptions, 0);
    }

    #[test]
    fn test_relay_counts_drops_without_subscribers() {
        let manager = ClientManager::new(16);
        assert!(!manager.relay(vec![Frame::from_text("topic")]));

        let (_, filter) = manager.add_connection("peer");
        filter.write().apply(&SubscriptionCommand::Subscribe(b"topic".to_vec()));
        let mut rx = manager.subscribe();
        assert!(manager.relay(vec![Frame::from_text("topic"), Frame::from_byte(9)]));

        let stats = manager.stats();
        assert_eq!((stats.relayed, stats.dropped), (1, 1));
        let message = rx.try_recv().unwrap();
        assert_eq!(message.len(), 2);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_counted() {
        let manager = ClientManager::new(2);
        let (id, filter) = manager.add_connection("slow");
        filter.write().apply(&SubscriptionCommand::Subscribe(b"t".to_vec()));
        let mut rx = manager.subscribe();

        for i in 0..5u8 {
            assert!(manager.relay(vec![Frame::from_text("t"), Frame::from_byte(i)]));
        }

        // Only the last two are still buffered
        let next = next_relayed(&manager, &mut rx, id).await.unwrap();
        assert_eq!(next[1], Frame::from_byte(3));
        let stats = manager.stats();
        assert_eq!((stats.relayed, stats.lagged), (5, 3));
    }

    #[test]
    fn test_topic_of_empty_message() {
        assert_eq!(topic_of(&[]), b"");
        assert_eq!(topic_of(&[Frame::from_text("t"), Frame::empty()]), b"t");
    }
}
