//! Puzzle domain: containers, the reservoir, problem state and strategies

pub mod container;
pub mod problem;
pub mod reservoir;
pub mod state;
pub mod strategy;

pub use container::Container;
pub use problem::{Problem, SolveSteps};
pub use reservoir::{Reservoir, ReservoirSnapshot};
pub use state::ProblemState;
pub use strategy::{SingleContainerStrategy, StrategyKind};
