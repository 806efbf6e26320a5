//! # Work Queue
//!
//! Competing-consumer queue with visibility timeouts:
//!
//! - `claim` hides the next visible message for the visibility timeout and
//!   increments its dequeue count
//! - `delete` removes a claimed message for good, but only for the holder of
//!   the latest claim: every claim issues a fresh receipt, and a delete
//!   carrying an older one fails with [`QueueError::ClaimLost`]
//! - a claimed message that is never deleted becomes visible again once its
//!   timeout passes, keeping its dequeue count
//!
//! Two implementations: [`InMemoryWorkQueue`] for tests and embedding, and
//! [`SpoolQueue`], a directory-backed queue several processes can share.

mod in_memory;
mod spool;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use in_memory::InMemoryWorkQueue;
pub use spool::SpoolQueue;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Message {id} not found in queue '{queue}'")]
    NotFound { queue: String, id: String },

    /// The message was claimed again after this claim expired
    #[error("Claim on message {id} in queue '{queue}' was superseded")]
    ClaimLost { queue: String, id: String },

    #[error("Queue I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt queue record {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid visibility timeout: {0:?}")]
    InvalidTimeout(Duration),
}

impl QueueError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        QueueError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// A claimed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub body: Vec<u8>,
    /// Identifies this claim; required to delete
    pub receipt: String,
    /// Times this message has been claimed, including this claim
    pub dequeue_count: u32,
    /// When the claim expires and the message becomes visible again
    pub visible_at: DateTime<Utc>,
    pub enqueued_at: DateTime<Utc>,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Append a message; returns its id
    async fn enqueue(&self, body: &[u8]) -> Result<String, QueueError>;

    /// Claim the oldest visible message, if any
    async fn claim(&self, visibility_timeout: Duration) -> Result<Option<QueueMessage>, QueueError>;

    /// Remove a claimed message, provided `message` holds its latest claim
    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError>;

    /// Messages in the queue, visible or claimed
    async fn len(&self) -> Result<usize, QueueError>;
}

pub(crate) fn visibility_deadline(
    now: DateTime<Utc>,
    visibility_timeout: Duration,
) -> Result<DateTime<Utc>, QueueError> {
    chrono::Duration::from_std(visibility_timeout)
        .ok()
        .and_then(|timeout| now.checked_add_signed(timeout))
        .ok_or(QueueError::InvalidTimeout(visibility_timeout))
}
