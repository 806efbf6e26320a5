//! Records that travel between processes: the queued job descriptor, the
//! per-step record a strategy publishes and the final result.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::common::errors::ValidationError;
use crate::puzzle::container::Container;
use crate::puzzle::reservoir::ReservoirSnapshot;
use crate::puzzle::state::ProblemState;

/// Move performed by a step. The discriminant is the wire byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ActionKind {
    Init = 0,
    Empty = 1,
    Fill = 2,
    Transfer = 3,
}

/// One step of a strategy run
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct StepRecord {
    pub strategy_name: String,
    /// Container the action was applied to, as it looked afterwards
    pub actor: Container,
    pub action: ActionKind,
    pub step_number: i32,
    pub amount: i32,
    pub description: String,
    pub ending_state: ProblemState,
}

/// Outcome of a completed strategy run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct ResultRecord {
    pub step_count: i32,
    pub ending_reservoir: ReservoirSnapshot,
}

/// Work item placed on the queue.
///
/// A negative `work_delay_ms` means "no delay between steps"; zero means
/// "yield between steps".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct JobDescriptor {
    pub first_capacity: i32,
    pub second_capacity: i32,
    pub goal_volume: i32,
    pub start_delay_ms: i32,
    pub work_delay_ms: i32,
}

impl JobDescriptor {
    /// Descriptor with no start delay and no pacing between steps
    pub fn new(first_capacity: i32, second_capacity: i32, goal_volume: i32) -> Self {
        Self {
            first_capacity,
            second_capacity,
            goal_volume,
            start_delay_ms: 0,
            work_delay_ms: -1,
        }
    }

    pub fn with_delays(mut self, start_delay_ms: i32, work_delay_ms: i32) -> Self {
        self.start_delay_ms = start_delay_ms;
        self.work_delay_ms = work_delay_ms;
        self
    }

    /// Range checks applied before a job is accepted for execution
    pub fn validate(&self) -> Result<(), ValidationError> {
        for capacity in [self.first_capacity, self.second_capacity] {
            if capacity < 1 {
                return Err(ValidationError::NonPositiveCapacity { capacity });
            }
        }
        if self.goal_volume < 0 {
            return Err(ValidationError::NegativeGoal {
                goal: self.goal_volume,
            });
        }
        Ok(())
    }
}

/// Topic string for one strategy's update stream: `"{from}|{to}|{goal}|{strategy}"`
pub fn topic_for(from_capacity: i32, to_capacity: i32, goal: i32, strategy_name: &str) -> String {
    format!("{from_capacity}|{to_capacity}|{goal}|{strategy_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_wire_values() {
        assert_eq!(u8::from(ActionKind::Init), 0);
        assert_eq!(u8::from(ActionKind::Transfer), 3);
        assert_eq!(ActionKind::try_from(2u8).unwrap(), ActionKind::Fill);
        assert!(ActionKind::try_from(9u8).is_err());
    }

    #[test]
    fn test_job_validation() {
        assert!(JobDescriptor::new(3, 5, 4).validate().is_ok());
        assert!(JobDescriptor::new(3, 5, 0).validate().is_ok());
        assert!(matches!(
            JobDescriptor::new(0, 5, 4).validate(),
            Err(ValidationError::NonPositiveCapacity { capacity: 0 })
        ));
        assert!(matches!(
            JobDescriptor::new(3, 5, -2).validate(),
            Err(ValidationError::NegativeGoal { goal: -2 })
        ));
    }

    #[test]
    fn test_topic_format() {
        assert_eq!(topic_for(3, 5, 4, "SmallToBig"), "3|5|4|SmallToBig");
    }
}
