//! Greedy single-container strategies.
//!
//! A strategy always pours from one designated container (`from`) into the
//! other (`to`):
//!
//! 1. `to` full → empty `to`
//! 2. `from` empty → fill `from`
//! 3. otherwise → transfer `from` → `to`
//!
//! The run ends when either container holds the goal volume.

use tracing::trace;

use crate::common::errors::DomainError;
use crate::messages::{topic_for, ActionKind, ResultRecord, StepRecord};
use crate::puzzle::container::Container;
use crate::puzzle::problem::Problem;
use crate::puzzle::reservoir::Reservoir;
use crate::puzzle::state::ProblemState;

/// Which orientation a strategy pours in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum StrategyKind {
    /// Pour from the smaller container into the larger one
    SmallToBig,
    /// Pour from the larger container into the smaller one
    BigToSmall,
}

impl StrategyKind {
    /// Every strategy executed for a job
    pub const ALL: [StrategyKind; 2] = [StrategyKind::SmallToBig, StrategyKind::BigToSmall];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::SmallToBig => "SmallToBig",
            StrategyKind::BigToSmall => "BigToSmall",
        }
    }

    /// Pick `(from, to)` out of the problem's two containers
    fn orient<'a>(&self, first: &'a Container, second: &'a Container) -> (&'a Container, &'a Container) {
        let first_is_from = match self {
            StrategyKind::SmallToBig => first.capacity() < second.capacity(),
            StrategyKind::BigToSmall => first.capacity() > second.capacity(),
        };
        if first_is_from {
            (first, second)
        } else {
            (second, first)
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Mutable run state of one strategy over private copies of the containers
#[derive(Debug, Clone)]
pub struct SingleContainerStrategy {
    kind: StrategyKind,
    from: Container,
    to: Container,
    goal: i32,
    reservoir: Reservoir,
    steps_taken: i32,
}

impl SingleContainerStrategy {
    pub fn new(kind: StrategyKind, problem: &Problem) -> Self {
        let (from, to) = kind.orient(problem.first(), problem.second());
        Self {
            kind,
            from: from.clone(),
            to: to.clone(),
            goal: problem.goal(),
            reservoir: Reservoir::new(),
            steps_taken: 0,
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn from(&self) -> &Container {
        &self.from
    }

    pub fn to(&self) -> &Container {
        &self.to
    }

    pub fn steps_taken(&self) -> i32 {
        self.steps_taken
    }

    /// Topic this strategy's updates are published on
    pub fn topic(&self) -> String {
        topic_for(self.from.capacity(), self.to.capacity(), self.goal, self.name())
    }

    /// Containers in `[to, from]` order plus the reservoir counters
    pub fn current_state(&self) -> ProblemState {
        ProblemState::new(
            vec![self.to.clone(), self.from.clone()],
            self.reservoir.snapshot(),
        )
    }

    pub fn is_goal_met(&self) -> bool {
        self.to.fill() == self.goal || self.from.fill() == self.goal
    }

    /// Apply the next greedy move and describe it
    pub fn take_action(&mut self) -> Result<StepRecord, DomainError> {
        let (action, amount, description, actor) = if self.to.is_full() {
            let amount = self.to.empty_into(&mut self.reservoir)?;
            let description = format!("Empty {} of {}", self.to.name(), amount);
            (ActionKind::Empty, amount, description, self.to.clone())
        } else if self.from.is_empty() {
            let amount = self.from.fill_from(&mut self.reservoir)?;
            let description = format!("Fill {} with {}", self.from.name(), amount);
            (ActionKind::Fill, amount, description, self.from.clone())
        } else {
            let amount = self.from.transfer_to(&mut self.to)?;
            let description = format!(
                "Transfer {} from {} to {}",
                amount,
                self.from.name(),
                self.to.name()
            );
            (ActionKind::Transfer, amount, description, self.from.clone())
        };

        self.steps_taken += 1;
        trace!(
            strategy = self.name(),
            step = self.steps_taken,
            from = %self.from,
            to = %self.to,
            "{}",
            description
        );

        Ok(StepRecord {
            strategy_name: self.name().to_string(),
            actor,
            action,
            step_number: self.steps_taken,
            amount,
            description,
            ending_state: self.current_state(),
        })
    }

    /// Steps taken so far and the reservoir counters
    pub fn result(&self) -> ResultRecord {
        ResultRecord {
            step_count: self.steps_taken,
            ending_reservoir: self.reservoir.snapshot(),
        }
    }
}
