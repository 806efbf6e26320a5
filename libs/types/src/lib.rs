//! # Bucket Puzzle Types
//!
//! Data model shared by the worker, the relay and the consumers.
//!
//! ## Contents
//!
//! - **Puzzle domain**: [`Container`], [`Reservoir`], [`Problem`] and the two
//!   greedy strategies ([`StrategyKind`]) that produce a stream of steps
//! - **Records**: [`StepRecord`], [`ResultRecord`] and [`JobDescriptor`], the
//!   values that are encoded by `codec` and moved between processes
//! - **Errors**: [`ValidationError`] for local argument checks and
//!   [`DomainError`] for failures a running strategy reports as [`ErrorInfo`]
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{Problem, StrategyKind};
//!
//! let problem = Problem::new(3, 5, 4).unwrap();
//! let mut run = problem.solve(StrategyKind::BigToSmall);
//! for step in run.by_ref() {
//!     let step = step.unwrap();
//!     println!("{}: {}", step.step_number, step.description);
//! }
//! assert_eq!(run.result().step_count, 6);
//! ```
//!
//! Encoding lives in the `codec` crate; this crate has no wire knowledge.

pub mod common;
pub mod messages;
pub mod puzzle;

pub use common::{DomainError, ErrorInfo, ValidationError};
pub use messages::{topic_for, ActionKind, JobDescriptor, ResultRecord, StepRecord};
pub use puzzle::{
    Container, Problem, ProblemState, Reservoir, ReservoirSnapshot, SingleContainerStrategy,
    SolveSteps, StrategyKind,
};
