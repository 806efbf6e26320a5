//! # In-Memory Work Queue
//!
//! Single-process queue with visibility timeout simulation. Messages live in
//! a `VecDeque` in FIFO order; claimed messages stay in place with a
//! `visible_at` deadline until they are deleted or the deadline passes.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::trace;
use uuid::Uuid;

use super::{visibility_deadline, QueueError, QueueMessage, WorkQueue};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    /// None = visible now
    visible_at: Option<DateTime<Utc>>,
    dequeue_count: u32,
    /// Receipt of the latest claim
    receipt: Option<String>,
}

#[derive(Debug)]
pub struct InMemoryWorkQueue {
    name: String,
    messages: Mutex<VecDeque<StoredMessage>>,
}

impl InMemoryWorkQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Mutex::new(VecDeque::new()),
        }
    }

    /// Bodies currently stored, in queue order (for tests)
    pub async fn bodies(&self) -> Vec<Vec<u8>> {
        self.messages
            .lock()
            .await
            .iter()
            .map(|m| m.body.clone())
            .collect()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, body: &[u8]) -> Result<String, QueueError> {
        let id = Uuid::new_v4().to_string();
        self.messages.lock().await.push_back(StoredMessage {
            id: id.clone(),
            body: body.to_vec(),
            enqueued_at: Utc::now(),
            visible_at: None,
            dequeue_count: 0,
            receipt: None,
        });
        trace!(queue = %self.name, id = %id, "enqueued");
        Ok(id)
    }

    async fn claim(&self, visibility_timeout: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let now = Utc::now();
        let deadline = visibility_deadline(now, visibility_timeout)?;

        let mut messages = self.messages.lock().await;
        let Some(msg) = messages
            .iter_mut()
            .find(|m| m.visible_at.map_or(true, |vt| vt <= now))
        else {
            return Ok(None);
        };

        let receipt = Uuid::new_v4().to_string();
        msg.visible_at = Some(deadline);
        msg.dequeue_count += 1;
        msg.receipt = Some(receipt.clone());
        Ok(Some(QueueMessage {
            id: msg.id.clone(),
            body: msg.body.clone(),
            receipt,
            dequeue_count: msg.dequeue_count,
            visible_at: deadline,
            enqueued_at: msg.enqueued_at,
        }))
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut messages = self.messages.lock().await;
        match messages.iter().position(|m| m.id == message.id) {
            Some(pos) if messages[pos].receipt.as_deref() == Some(message.receipt.as_str()) => {
                messages.remove(pos);
                Ok(())
            }
            Some(_) => Err(QueueError::ClaimLost {
                queue: self.name.clone(),
                id: message.id.clone(),
            }),
            None => Err(QueueError::NotFound {
                queue: self.name.clone(),
                id: message.id.clone(),
            }),
        }
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.messages.lock().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIDE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_fifo_claim_and_delete() {
        let queue = InMemoryWorkQueue::new("jobs");
        queue.enqueue(b"first").await.unwrap();
        queue.enqueue(b"second").await.unwrap();

        let first = queue.claim(HIDE).await.unwrap().unwrap();
        assert_eq!(first.body, b"first");
        assert_eq!(first.dequeue_count, 1);

        let second = queue.claim(HIDE).await.unwrap().unwrap();
        assert_eq!(second.body, b"second");
        assert!(queue.claim(HIDE).await.unwrap().is_none());

        queue.delete(&first).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 1);
        assert!(matches!(
            queue.delete(&first).await,
            Err(QueueError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_expired_claim_is_redelivered_with_count() {
        let queue = InMemoryWorkQueue::new("jobs");
        queue.enqueue(b"job").await.unwrap();

        for expected in 1..=3 {
            let msg = queue.claim(Duration::ZERO).await.unwrap().unwrap();
            assert_eq!(msg.dequeue_count, expected);
        }
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stale_claim_cannot_delete() {
        let queue = InMemoryWorkQueue::new("jobs");
        queue.enqueue(b"job").await.unwrap();

        let stale = queue.claim(Duration::ZERO).await.unwrap().unwrap();
        let current = queue.claim(HIDE).await.unwrap().unwrap();
        assert_ne!(stale.receipt, current.receipt);

        assert!(matches!(
            queue.delete(&stale).await,
            Err(QueueError::ClaimLost { .. })
        ));
        assert_eq!(queue.len().await.unwrap(), 1);
        queue.delete(&current).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_queue_claims_nothing() {
        let queue = InMemoryWorkQueue::new("jobs");
        assert!(queue.claim(HIDE).await.unwrap().is_none());
        assert_eq!(queue.name(), "jobs");
    }
}
