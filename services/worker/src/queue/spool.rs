//! # Spool Directory Queue
//!
//! A queue several worker processes can share through the filesystem:
//!
//! ```text
//! {root}/{name}/ready/     visible messages
//! {root}/{name}/inflight/  claimed messages
//! ```
//!
//! Each message is one JSON record named `{enqueued_ns}-{uuid}.msg`, so a
//! sorted directory listing is FIFO order. Claiming renames a file from
//! `ready/` to `inflight/`; the rename is atomic, so exactly one process
//! wins each message. Records are rewritten through a temporary file and a
//! rename, so readers never see a partial record.
//!
//! The claim receipt is stored in the record. `delete` checks it before
//! removing the file; a claim that lands between that check and the removal
//! is lost, and the message is gone with it.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{visibility_deadline, QueueError, QueueMessage, WorkQueue};

const READY: &str = "ready";
const INFLIGHT: &str = "inflight";
const EXTENSION: &str = "msg";
/// How long a claim may sit without a deadline before it counts as abandoned
const CLAIM_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SpoolRecord {
    body: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    dequeue_count: u32,
    /// Set once a claim is complete; absent while ready
    visible_at: Option<DateTime<Utc>>,
    #[serde(default)]
    receipt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SpoolQueue {
    name: String,
    ready: PathBuf,
    inflight: PathBuf,
}

impl SpoolQueue {
    /// Open (creating if needed) the queue `name` under `root`
    pub async fn open(root: impl AsRef<Path>, name: &str) -> Result<Self, QueueError> {
        let base = root.as_ref().join(name);
        let ready = base.join(READY);
        let inflight = base.join(INFLIGHT);
        for dir in [&ready, &inflight] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| QueueError::io(dir, e))?;
        }
        info!(queue = name, path = %base.display(), "spool queue opened");
        Ok(Self {
            name: name.to_string(),
            ready,
            inflight,
        })
    }

    fn file_name(id: &str) -> String {
        format!("{id}.{EXTENSION}")
    }

    /// Move expired claims back to `ready/`, keeping their dequeue count
    async fn requeue_expired(&self, now: DateTime<Utc>) -> Result<(), QueueError> {
        for path in list_messages(&self.inflight).await? {
            let record = match read_record(&path).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(queue = %self.name, error = %e, "skipping unreadable in-flight record");
                    continue;
                }
            };

            let expired = match record.visible_at {
                Some(deadline) => deadline <= now,
                None => claim_abandoned(&path).await,
            };
            if !expired {
                continue;
            }

            let Some(file_name) = path.file_name() else {
                continue;
            };
            match fs::rename(&path, self.ready.join(file_name)).await {
                Ok(()) => debug!(
                    queue = %self.name,
                    file = ?file_name,
                    dequeue_count = record.dequeue_count,
                    "claim expired, message visible again"
                ),
                // Another process requeued or deleted it first
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(QueueError::io(&path, e)),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl WorkQueue for SpoolQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, body: &[u8]) -> Result<String, QueueError> {
        let now = Utc::now();
        let nanos = now.timestamp_nanos_opt().unwrap_or_default();
        let id = format!("{nanos:020}-{}", Uuid::new_v4().simple());
        let record = SpoolRecord {
            body: body.to_vec(),
            enqueued_at: now,
            dequeue_count: 0,
            visible_at: None,
            receipt: None,
        };
        write_record(&self.ready, &Self::file_name(&id), &record).await?;
        debug!(queue = %self.name, id = %id, "enqueued");
        Ok(id)
    }

    async fn claim(&self, visibility_timeout: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let now = Utc::now();
        let deadline = visibility_deadline(now, visibility_timeout)?;
        self.requeue_expired(now).await?;

        for path in list_messages(&self.ready).await? {
            let Some(file_name) = path.file_name().map(|n| n.to_os_string()) else {
                continue;
            };
            let claimed = self.inflight.join(&file_name);
            match fs::rename(&path, &claimed).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(QueueError::io(&path, e)),
            }

            let Some(mut record) = read_record(&claimed).await? else {
                continue;
            };
            let receipt = Uuid::new_v4().simple().to_string();
            record.dequeue_count += 1;
            record.visible_at = Some(deadline);
            record.receipt = Some(receipt.clone());
            let file_name = file_name.to_string_lossy().into_owned();
            write_record(&self.inflight, &file_name, &record).await?;

            let id = file_name
                .strip_suffix(&format!(".{EXTENSION}"))
                .unwrap_or(&file_name)
                .to_string();
            return Ok(Some(QueueMessage {
                id,
                body: record.body,
                receipt,
                dequeue_count: record.dequeue_count,
                visible_at: deadline,
                enqueued_at: record.enqueued_at,
            }));
        }
        Ok(None)
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let file_name = Self::file_name(&message.id);
        // A message can be back in ready/ if its claim expired before the delete
        for dir in [&self.inflight, &self.ready] {
            let path = dir.join(&file_name);
            let Some(record) = read_record(&path).await? else {
                continue;
            };
            if record.receipt.as_deref() != Some(message.receipt.as_str()) {
                return Err(QueueError::ClaimLost {
                    queue: self.name.clone(),
                    id: message.id.clone(),
                });
            }
            match fs::remove_file(&path).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(QueueError::io(&path, e)),
            }
        }
        Err(QueueError::NotFound {
            queue: self.name.clone(),
            id: message.id.clone(),
        })
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(list_messages(&self.ready).await?.len() + list_messages(&self.inflight).await?.len())
    }
}

/// `.msg` files in `dir`, sorted by name
async fn list_messages(dir: &Path) -> Result<Vec<PathBuf>, QueueError> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| QueueError::io(dir, e))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| QueueError::io(dir, e))? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// `Ok(None)` when the file vanished under us
async fn read_record(path: &Path) -> Result<Option<SpoolRecord>, QueueError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(QueueError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| QueueError::Corrupt {
            path: path.display().to_string(),
            source,
        })
}

async fn write_record(dir: &Path, file_name: &str, record: &SpoolRecord) -> Result<(), QueueError> {
    let bytes = serde_json::to_vec(record).map_err(|source| QueueError::Corrupt {
        path: dir.join(file_name).display().to_string(),
        source,
    })?;
    let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));
    fs::write(&tmp, &bytes)
        .await
        .map_err(|e| QueueError::io(&tmp, e))?;
    let target = dir.join(file_name);
    fs::rename(&tmp, &target)
        .await
        .map_err(|e| QueueError::io(&target, e))
}

/// A claim without a deadline is abandoned once the file has not changed
/// for [`CLAIM_GRACE`]. The inode change time moves on rename, so this
/// measures time since the claim, not since the enqueue.
async fn claim_abandoned(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(metadata) = fs::metadata(path).await else {
        return false;
    };
    let changed = SystemTime::UNIX_EPOCH + Duration::from_secs(metadata.ctime().max(0) as u64);
    SystemTime::now()
        .duration_since(changed)
        .is_ok_and(|age| age > CLAIM_GRACE)
}
