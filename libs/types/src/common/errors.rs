//! Error types for the puzzle domain
//!
//! `ValidationError` covers argument and range checks raised locally when a
//! container, reservoir or problem is built or mutated. `DomainError` is what
//! a running strategy can fail with; it is the only error that is ever turned
//! into an `ErrorInfo` and published to consumers.

use thiserror::Error;

/// Argument and range validation failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Container capacity must be strictly positive
    #[error("Capacity must be at least 1, got {capacity}")]
    NonPositiveCapacity { capacity: i32 },

    /// Fill level outside `[0, capacity]`
    #[error("Fill {fill} is outside [0, {capacity}]")]
    FillOutOfRange { fill: i32, capacity: i32 },

    /// Goal volume must be non-negative
    #[error("Goal volume must be >= 0, got {goal}")]
    NegativeGoal { goal: i32 },

    /// Reservoir transfers must move at least one unit
    #[error("Reservoir {operation} amount must be >= 1, got {amount}")]
    NonPositiveAmount {
        operation: &'static str,
        amount: i32,
    },

    /// Counter would exceed the 32-bit signed maximum
    #[error("Reservoir {counter} would overflow: {current} + {amount} > {}", i32::MAX)]
    CounterOverflow {
        counter: &'static str,
        current: i32,
        amount: i32,
    },

    /// Negative counter value in a reservoir snapshot
    #[error("Reservoir {counter} cannot be negative, got {value}")]
    NegativeCounter { counter: &'static str, value: i32 },
}

/// Failures raised while solving a problem
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Goal cannot be reached from the given capacities
    #[error("Problem {first}|{second}|{goal} is not solvable")]
    Unsolvable { first: i32, second: i32, goal: i32 },

    /// Transfer attempted into a container with no space left
    #[error("Cannot transfer into {name}: container is full ({capacity})")]
    ContainerFull { name: String, capacity: i32 },
}

impl DomainError {
    /// Stable tag published in `ErrorInfo::kind_tag`
    pub fn kind_tag(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "ValidationError",
            DomainError::Unsolvable { .. } => "UnsolvableError",
            DomainError::ContainerFull { .. } => "ContainerFullError",
        }
    }
}

/// Serialized description of a failure, carried by Error updates
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorInfo {
    pub kind_tag: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind_tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind_tag: kind_tag.into(),
            message: message.into(),
        }
    }
}

impl From<&DomainError> for ErrorInfo {
    fn from(err: &DomainError) -> Self {
        Self::new(err.kind_tag(), err.to_string())
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind_tag, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_carries_tag_and_message() {
        let err = DomainError::Unsolvable {
            first: 4,
            second: 4,
            goal: 3,
        };
        let info = ErrorInfo::from(&err);
        assert_eq!(info.kind_tag, "UnsolvableError");
        assert_eq!(info.message, "Problem 4|4|3 is not solvable");
    }

    #[test]
    fn test_validation_converts_into_domain_error() {
        let err: DomainError = ValidationError::NegativeGoal { goal: -1 }.into();
        assert_eq!(err.kind_tag(), "ValidationError");
        assert!(err.to_string().contains("-1"));
    }
}
