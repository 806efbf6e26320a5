//! Problem definition, solvability check and the step iterator.

use crate::common::errors::{DomainError, ValidationError};
use crate::messages::{ActionKind, ResultRecord, StepRecord};
use crate::puzzle::container::Container;
use crate::puzzle::state::ProblemState;
use crate::puzzle::strategy::{SingleContainerStrategy, StrategyKind};

/// Two containers and a goal volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    first: Container,
    second: Container,
    goal: i32,
    solvable: bool,
}

impl Problem {
    /// Problem over empty containers named "A" and "B"
    pub fn new(first_capacity: i32, second_capacity: i32, goal: i32) -> Result<Self, ValidationError> {
        Self::with_containers(
            Container::new(first_capacity, "A")?,
            Container::new(second_capacity, "B")?,
            goal,
        )
    }

    pub fn with_containers(
        first: Container,
        second: Container,
        goal: i32,
    ) -> Result<Self, ValidationError> {
        if goal < 0 {
            return Err(ValidationError::NegativeGoal { goal });
        }
        let solvable = check_solvable(first.capacity(), second.capacity(), goal);
        Ok(Self {
            first,
            second,
            goal,
            solvable,
        })
    }

    pub fn first(&self) -> &Container {
        &self.first
    }

    pub fn second(&self) -> &Container {
        &self.second
    }

    pub fn goal(&self) -> i32 {
        self.goal
    }

    /// Order-independent key `"{min}|{max}|{goal}"`
    pub fn key(&self) -> String {
        let (a, b) = (self.first.capacity(), self.second.capacity());
        format!("{}|{}|{}", a.min(b), a.max(b), self.goal)
    }

    /// Computed once at construction; the problem is immutable.
    pub fn is_solvable(&self) -> bool {
        self.solvable
    }

    /// Run `kind` against this problem.
    ///
    /// The returned iterator yields the Init step, then one step per action
    /// until the goal is met. It yields a single `Unsolvable` error instead
    /// if the problem fails the solvability check, or if the containers come
    /// back to their initial state.
    pub fn solve(&self, kind: StrategyKind) -> SolveSteps {
        SolveSteps::new(self, kind, true)
    }

    /// Same as [`Problem::solve`] without the upfront solvability check;
    /// only the cycle detection guards against looping forever.
    pub fn solve_unchecked(&self, kind: StrategyKind) -> SolveSteps {
        SolveSteps::new(self, kind, false)
    }

    fn unsolvable(&self) -> DomainError {
        DomainError::Unsolvable {
            first: self.first.capacity(),
            second: self.second.capacity(),
            goal: self.goal,
        }
    }
}

fn check_solvable(first: i32, second: i32, goal: i32) -> bool {
    if goal == 0 || first == goal || second == goal {
        return true;
    }
    if first == second {
        return false;
    }
    if goal > first && goal > second {
        return false;
    }
    let (min, max) = (first.min(second), first.max(second));
    let remainder = max % min;
    let counter = if remainder > 0 { remainder } else { min };
    goal % counter == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Running,
    Done,
}

/// One-shot iterator over a strategy run. Owns its strategy, so a finished
/// run cannot be restarted; solve again to get a fresh one.
#[derive(Debug)]
pub struct SolveSteps {
    strategy: SingleContainerStrategy,
    initial_state: ProblemState,
    init_actor: Container,
    unsolvable: Option<DomainError>,
    cycle_error: DomainError,
    phase: Phase,
}

impl SolveSteps {
    fn new(problem: &Problem, kind: StrategyKind, check_first: bool) -> Self {
        let strategy = SingleContainerStrategy::new(kind, problem);
        let unsolvable = (check_first && !problem.is_solvable()).then(|| problem.unsolvable());
        Self {
            initial_state: strategy.current_state(),
            init_actor: problem.first().clone(),
            strategy,
            unsolvable,
            cycle_error: problem.unsolvable(),
            phase: Phase::Start,
        }
    }

    pub fn strategy(&self) -> &SingleContainerStrategy {
        &self.strategy
    }

    pub fn topic(&self) -> String {
        self.strategy.topic()
    }

    /// Result of the run so far (final once the iterator returns `None`)
    pub fn result(&self) -> ResultRecord {
        self.strategy.result()
    }

    fn init_step(&self) -> StepRecord {
        StepRecord {
            strategy_name: self.strategy.name().to_string(),
            actor: self.init_actor.clone(),
            action: ActionKind::Init,
            step_number: 0,
            amount: 0,
            description: "Initial State".to_string(),
            ending_state: self.initial_state.clone(),
        }
    }
}

impl Iterator for SolveSteps {
    type Item = Result<StepRecord, DomainError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.phase {
            Phase::Done => None,
            Phase::Start => {
                if let Some(err) = self.unsolvable.take() {
                    self.phase = Phase::Done;
                    return Some(Err(err));
                }
                self.phase = Phase::Running;
                Some(Ok(self.init_step()))
            }
            Phase::Running => {
                if self.strategy.is_goal_met() {
                    self.phase = Phase::Done;
                    return None;
                }
                match self.strategy.take_action() {
                    Ok(_) if self
                        .strategy
                        .current_state()
                        .same_container_state(&self.initial_state) =>
                    {
                        self.phase = Phase::Done;
                        Some(Err(self.cycle_error.clone()))
                    }
                    Ok(step) => Some(Ok(step)),
                    Err(err) => {
                        self.phase = Phase::Done;
                        Some(Err(err))
                    }
                }
            }
        }
    }
}

impl std::iter::FusedIterator for SolveSteps {}
