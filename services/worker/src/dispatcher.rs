//! # Worker Dispatcher
//!
//! Claims jobs from the work queue and runs every strategy for each job
//! concurrently, one task and one publisher connection per strategy.
//!
//! ```text
//! Idle → Polling ─┬─ nothing visible ─→ Waiting → Polling
//!                 └─ claimed ─→ Claimed → Executing → Acking → Idle
//! ```
//!
//! A claimed message is deleted only after all of its strategy tasks have
//! been joined. If a task panics the message is left alone and comes back
//! after its visibility timeout. Messages dequeued more than
//! `poison_threshold` times are discarded without running anything, as are
//! bodies that can never be executed.
//!
//! Queue failures never stop the loop. A failed claim counts as an idle
//! cycle; a failed delete or dead-letter write leaves the message to come
//! back after its visibility timeout. Losing the forwarder is the only
//! fatal error.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use network::{InprocConnector, WakeSignal};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use types::{JobDescriptor, Problem, StrategyKind};
use worker_config::WorkerSettings;

use crate::error::{DispatchError, Result};
use crate::queue::{QueueError, QueueMessage, WorkQueue};
use crate::strategy_task::{run_strategy, StrategyReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    Polling,
    Waiting,
    Claimed,
    Executing,
    Acking,
}

/// What one poll cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing visible in the queue
    Idle,
    /// The claim itself failed; treated like an empty queue
    Unavailable { reason: String },
    /// Dequeued too often; discarded unprocessed
    Poisoned { id: String, dequeue_count: u32 },
    /// Body could not be decoded or describes an invalid problem; discarded
    Rejected { id: String, reason: String },
    /// Every strategy ran; the message was deleted
    Completed {
        id: String,
        reports: Vec<StrategyReport>,
    },
    /// A strategy task panicked; the message stays for redelivery
    Faulted { id: String, reason: String },
    /// Processing finished but the message could not be removed, usually
    /// because another worker claimed it after the visibility timeout
    AckFailed { id: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub visibility_timeout: Duration,
    pub poison_threshold: u32,
    pub idle_poll_interval: Duration,
    pub startup_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&WorkerSettings::default())
    }
}

impl From<&WorkerSettings> for DispatcherConfig {
    fn from(settings: &WorkerSettings) -> Self {
        Self {
            visibility_timeout: settings.visibility_timeout(),
            poison_threshold: settings.poison_threshold,
            idle_poll_interval: settings.idle_poll_interval(),
            startup_delay: settings.startup_delay(),
        }
    }
}

pub struct WorkerDispatcher {
    queue: Arc<dyn WorkQueue>,
    dead_letter: Option<Arc<dyn WorkQueue>>,
    connector: InprocConnector,
    wake: Option<WakeSignal>,
    config: DispatcherConfig,
    state: DispatcherState,
}

impl WorkerDispatcher {
    pub fn new(queue: Arc<dyn WorkQueue>, connector: InprocConnector, config: DispatcherConfig) -> Self {
        Self {
            queue,
            dead_letter: None,
            connector,
            wake: None,
            config,
            state: DispatcherState::Idle,
        }
    }

    /// Queue that receives poison and rejected bodies before they are deleted
    pub fn with_dead_letter(mut self, queue: Arc<dyn WorkQueue>) -> Self {
        self.dead_letter = Some(queue);
        self
    }

    /// Block on wake signals instead of polling on an interval when idle
    pub fn with_wake_signal(mut self, wake: WakeSignal) -> Self {
        self.wake = Some(wake);
        self
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Claim and fully process at most one message
    pub async fn run_once(&mut self) -> Result<CycleOutcome> {
        self.state = DispatcherState::Polling;
        let claimed = self.queue.claim(self.config.visibility_timeout).await;
        let message = match claimed {
            Ok(Some(message)) => message,
            Ok(None) => {
                self.state = DispatcherState::Idle;
                return Ok(CycleOutcome::Idle);
            }
            Err(e) => {
                warn!(queue = self.queue.name(), error = %e, "claim failed");
                self.state = DispatcherState::Idle;
                return Ok(CycleOutcome::Unavailable {
                    reason: e.to_string(),
                });
            }
        };

        self.state = DispatcherState::Claimed;
        let outcome = self.process(message).await;
        self.state = DispatcherState::Idle;
        outcome
    }

    async fn process(&mut self, message: QueueMessage) -> Result<CycleOutcome> {
        info!(
            queue = self.queue.name(),
            id = %message.id,
            dequeue_count = message.dequeue_count,
            "claimed message"
        );

        if message.dequeue_count > self.config.poison_threshold {
            warn!(
                id = %message.id,
                dequeue_count = message.dequeue_count,
                threshold = self.config.poison_threshold,
                "discarding poison message"
            );
            if let Err(e) = self.discard(&message).await {
                return Ok(ack_failed(message, e));
            }
            return Ok(CycleOutcome::Poisoned {
                id: message.id,
                dequeue_count: message.dequeue_count,
            });
        }

        self.state = DispatcherState::Executing;
        let (job, problem) = match decode_job(&message.body) {
            Ok(decoded) => decoded,
            Err(reason) => {
                warn!(id = %message.id, reason = %reason, "rejecting job");
                if let Err(e) = self.discard(&message).await {
                    return Ok(ack_failed(message, e));
                }
                return Ok(CycleOutcome::Rejected {
                    id: message.id,
                    reason,
                });
            }
        };

        if job.start_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(job.start_delay_ms as u64)).await;
        }

        let tasks = StrategyKind::ALL.map(|kind| {
            let publisher = self.connector.connect();
            tokio::spawn(run_strategy(problem.clone(), kind, publisher, job.work_delay_ms))
        });
        debug!(id = %message.id, key = %problem.key(), tasks = tasks.len(), "strategies started");

        let joined = join_all(tasks).await;

        self.state = DispatcherState::Acking;
        let mut reports = Vec::with_capacity(joined.len());
        for result in joined {
            match result {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => {
                    error!(id = %message.id, error = %e, "publishing failed");
                    return Err(DispatchError::Transport(e));
                }
                Err(join_error) => {
                    error!(id = %message.id, error = %join_error, "strategy task failed");
                    return Ok(CycleOutcome::Faulted {
                        id: message.id,
                        reason: join_error.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.queue.delete(&message).await {
            return Ok(ack_failed(message, e));
        }
        info!(id = %message.id, key = %problem.key(), "job completed");
        Ok(CycleOutcome::Completed {
            id: message.id,
            reports,
        })
    }

    /// Dead-letter (when configured) and delete
    async fn discard(&self, message: &QueueMessage) -> std::result::Result<(), QueueError> {
        if let Some(dead_letter) = &self.dead_letter {
            let id = dead_letter.enqueue(&message.body).await?;
            info!(
                id = %message.id,
                dead_letter_queue = dead_letter.name(),
                dead_letter_id = %id,
                "moved to dead-letter queue"
            );
        }
        self.queue.delete(message).await?;
        Ok(())
    }

    /// Process jobs until `shutdown` becomes true
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if !self.config.startup_delay.is_zero() {
            debug!(delay = ?self.config.startup_delay, "waiting before first poll");
            tokio::select! {
                _ = tokio::time::sleep(self.config.startup_delay) => {}
                _ = shutdown.changed() => {}
            }
        }

        while !*shutdown.borrow() {
            match self.run_once().await? {
                CycleOutcome::Idle | CycleOutcome::Unavailable { .. } => {
                    self.state = DispatcherState::Waiting;
                    tokio::select! {
                        _ = self.wait_for_work() => {}
                        _ = shutdown.changed() => {}
                    }
                    self.state = DispatcherState::Idle;
                }
                outcome => debug!(?outcome, "cycle finished"),
            }
        }

        info!("dispatcher stopped");
        Ok(())
    }

    /// Returns when it is worth polling again.
    ///
    /// With a wake signal this blocks until a non-empty signal arrives, but
    /// never longer than the visibility timeout so expired claims are picked
    /// up. Without one it sleeps for the idle poll interval.
    async fn wait_for_work(&mut self) {
        let Some(wake) = self.wake.as_mut() else {
            tokio::time::sleep(self.config.idle_poll_interval).await;
            return;
        };

        let deadline = tokio::time::sleep(self.config.visibility_timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                signal = wake.wait() => match signal {
                    Some(payload) if payload.is_empty() => {
                        debug!("ignoring spurious wake signal");
                    }
                    Some(_) => return,
                    None => {
                        warn!("wake signal closed, falling back to polling");
                        self.wake = None;
                        return;
                    }
                },
                _ = &mut deadline => return,
            }
        }
    }
}

fn ack_failed(message: QueueMessage, error: QueueError) -> CycleOutcome {
    warn!(
        id = %message.id,
        dequeue_count = message.dequeue_count,
        error = %error,
        "could not remove message, it will be redelivered"
    );
    CycleOutcome::AckFailed {
        id: message.id,
        reason: error.to_string(),
    }
}

fn decode_job(body: &[u8]) -> std::result::Result<(JobDescriptor, Problem), String> {
    let job = codec::job::decode(body).map_err(|e| e.to_string())?;
    job.validate().map_err(|e| e.to_string())?;
    let problem = Problem::new(job.first_capacity, job.second_capacity, job.goal_volume)
        .map_err(|e| e.to_string())?;
    Ok((job, problem))
}
