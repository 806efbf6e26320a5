//! # Bucket Puzzle Worker
//!
//! Pulls puzzle jobs from a [`WorkQueue`], solves each job with every
//! [`StrategyKind`](types::StrategyKind) at once and streams each step to
//! subscribers through an in-process [`forwarder`].
//!
//! ```text
//! submit ──▶ WorkQueue ──▶ WorkerDispatcher ──┬─ SmallToBig task ─┐
//!    │                        ▲               └─ BigToSmall task ─┤ inproc
//!    └──── wake signal ───────┘                                   ▼
//!                                          ForwarderBridge ──▶ subscribers
//! ```
//!
//! Binaries: `worker` runs the loop, `submit` enqueues a job, `watch`
//! follows the update topics of a job.

pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod queue;
pub mod strategy_task;

pub use dispatcher::{CycleOutcome, DispatcherConfig, DispatcherState, WorkerDispatcher};
pub use error::{DispatchError, Result};
pub use logging::init_logging;
pub use queue::{InMemoryWorkQueue, QueueError, QueueMessage, SpoolQueue, WorkQueue};
pub use strategy_task::{run_strategy, StrategyOutcome, StrategyReport};
