//! Fixed-capacity container (a "bucket") and the three moves it supports.

use crate::common::errors::{DomainError, ValidationError};
use crate::puzzle::reservoir::Reservoir;

/// A container with a fixed capacity and a current fill level.
///
/// The fill level always stays within `[0, capacity]`; every mutating
/// operation returns the amount actually moved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "ContainerFields")
)]
pub struct Container {
    capacity: i32,
    fill: i32,
    name: String,
}

/// Unchecked wire shape; deserialization goes through [`Container::with_fill`]
#[cfg(feature = "serialization")]
#[derive(serde::Deserialize)]
struct ContainerFields {
    capacity: i32,
    fill: i32,
    name: String,
}

#[cfg(feature = "serialization")]
impl TryFrom<ContainerFields> for Container {
    type Error = ValidationError;

    fn try_from(fields: ContainerFields) -> Result<Self, Self::Error> {
        Container::with_fill(fields.capacity, fields.fill, fields.name)
    }
}

impl Container {
    /// Empty container with the given capacity
    pub fn new(capacity: i32, name: impl Into<String>) -> Result<Self, ValidationError> {
        Self::with_fill(capacity, 0, name)
    }

    /// Container restored at a known fill level (used when decoding snapshots)
    pub fn with_fill(
        capacity: i32,
        fill: i32,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if capacity < 1 {
            return Err(ValidationError::NonPositiveCapacity { capacity });
        }
        if !(0..=capacity).contains(&fill) {
            return Err(ValidationError::FillOutOfRange { fill, capacity });
        }
        Ok(Self {
            capacity,
            fill,
            name: name.into(),
        })
    }

    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    pub fn fill(&self) -> i32 {
        self.fill
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_full(&self) -> bool {
        self.fill == self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.fill == 0
    }

    pub fn remaining_space(&self) -> i32 {
        self.capacity - self.fill
    }

    /// Top the container up from the reservoir
    pub fn fill_from(&mut self, reservoir: &mut Reservoir) -> Result<i32, ValidationError> {
        let needed = self.remaining_space();
        if needed == 0 {
            return Ok(0);
        }
        let drawn = reservoir.get_water(needed)?;
        self.fill += drawn;
        Ok(drawn)
    }

    /// Pour the whole content back into the reservoir
    pub fn empty_into(&mut self, reservoir: &mut Reservoir) -> Result<i32, ValidationError> {
        if self.fill == 0 {
            return Ok(0);
        }
        let discharged = reservoir.put_water(self.fill)?;
        self.fill = 0;
        Ok(discharged)
    }

    /// Pour as much as fits into `other`.
    ///
    /// Returns 0 when this container is empty; fails when `other` is already full.
    pub fn transfer_to(&mut self, other: &mut Container) -> Result<i32, DomainError> {
        if self.is_empty() {
            return Ok(0);
        }
        if other.is_full() {
            return Err(DomainError::ContainerFull {
                name: other.name.clone(),
                capacity: other.capacity,
            });
        }

        let moved = self.fill.min(other.remaining_space());
        self.fill -= moved;
        other.fill += moved;
        Ok(moved)
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}/{})", self.name, self.fill, self.capacity)
    }
}
