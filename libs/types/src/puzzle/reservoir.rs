//! Unbounded water source/sink shared by both containers of a strategy.

use crate::common::errors::ValidationError;

/// Point-in-time copy of the reservoir counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "SnapshotFields")
)]
pub struct ReservoirSnapshot {
    pub volume_drawn: i32,
    pub volume_discharged: i32,
}

#[cfg(feature = "serialization")]
#[derive(serde::Deserialize)]
struct SnapshotFields {
    volume_drawn: i32,
    volume_discharged: i32,
}

#[cfg(feature = "serialization")]
impl TryFrom<SnapshotFields> for ReservoirSnapshot {
    type Error = ValidationError;

    fn try_from(fields: SnapshotFields) -> Result<Self, Self::Error> {
        ReservoirSnapshot::new(fields.volume_drawn, fields.volume_discharged)
    }
}

impl ReservoirSnapshot {
    /// Build a snapshot, rejecting negative counters
    pub fn new(volume_drawn: i32, volume_discharged: i32) -> Result<Self, ValidationError> {
        if volume_drawn < 0 {
            return Err(ValidationError::NegativeCounter {
                counter: "volume_drawn",
                value: volume_drawn,
            });
        }
        if volume_discharged < 0 {
            return Err(ValidationError::NegativeCounter {
                counter: "volume_discharged",
                value: volume_discharged,
            });
        }
        Ok(Self {
            volume_drawn,
            volume_discharged,
        })
    }
}

/// Tracks how much liquid has been drawn from and discharged into the source.
///
/// Both counters only grow. A draw or discharge that would push a counter past
/// `i32::MAX` fails and leaves the reservoir untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reservoir {
    snapshot: ReservoirSnapshot,
}

impl Reservoir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw `amount` units out of the reservoir
    pub fn get_water(&mut self, amount: i32) -> Result<i32, ValidationError> {
        let current = self.snapshot.volume_drawn;
        self.snapshot.volume_drawn = checked_increase("volume_drawn", "draw", current, amount)?;
        Ok(amount)
    }

    /// Return `amount` units to the reservoir
    pub fn put_water(&mut self, amount: i32) -> Result<i32, ValidationError> {
        let current = self.snapshot.volume_discharged;
        self.snapshot.volume_discharged =
            checked_increase("volume_discharged", "discharge", current, amount)?;
        Ok(amount)
    }

    pub fn volume_drawn(&self) -> i32 {
        self.snapshot.volume_drawn
    }

    pub fn volume_discharged(&self) -> i32 {
        self.snapshot.volume_discharged
    }

    pub fn snapshot(&self) -> ReservoirSnapshot {
        self.snapshot
    }
}

fn checked_increase(
    counter: &'static str,
    operation: &'static str,
    current: i32,
    amount: i32,
) -> Result<i32, ValidationError> {
    if amount < 1 {
        return Err(ValidationError::NonPositiveAmount { operation, amount });
    }
    current
        .checked_add(amount)
        .ok_or(ValidationError::CounterOverflow {
            counter,
            current,
            amount,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut reservoir = Reservoir::new();
        reservoir.get_water(5).unwrap();
        reservoir.get_water(3).unwrap();
        reservoir.put_water(2).unwrap();

        assert_eq!(reservoir.volume_drawn(), 8);
        assert_eq!(reservoir.volume_discharged(), 2);
    }

    #[test]
    fn test_rejects_non_positive_amounts() {
        let mut reservoir = Reservoir::new();
        assert!(matches!(
            reservoir.get_water(0),
            Err(ValidationError::NonPositiveAmount { amount: 0, .. })
        ));
        assert!(reservoir.put_water(-4).is_err());
        assert_eq!(reservoir.snapshot(), ReservoirSnapshot::default());
    }

    #[test]
    fn test_overflow_leaves_counters_unchanged() {
        let mut reservoir = Reservoir::new();
        reservoir.get_water(i32::MAX - 1).unwrap();

        let err = reservoir.get_water(2).unwrap_err();
        assert!(matches!(err, ValidationError::CounterOverflow { .. }));
        assert_eq!(reservoir.volume_drawn(), i32::MAX - 1);

        reservoir.get_water(1).unwrap();
        assert_eq!(reservoir.volume_drawn(), i32::MAX);
    }

    #[cfg(feature = "serialization")]
    #[test]
    fn test_snapshot_deserialize_rejects_negative_counters() {
        let snapshot: ReservoirSnapshot =
            serde_json::from_str(r#"{"volume_drawn":8,"volume_discharged":3}"#).unwrap();
        assert_eq!(snapshot, ReservoirSnapshot::new(8, 3).unwrap());
        assert!(serde_json::from_str::<ReservoirSnapshot>(
            r#"{"volume_drawn":-1,"volume_discharged":0}"#
        )
        .is_err());
    }

    #[test]
    fn test_snapshot_rejects_negative_counters() {
        assert!(ReservoirSnapshot::new(-1, 0).is_err());
        assert!(ReservoirSnapshot::new(0, -1).is_err());
        assert_eq!(
            ReservoirSnapshot::new(7, 3).unwrap(),
            ReservoirSnapshot {
                volume_drawn: 7,
                volume_discharged: 3
            }
        );
    }
}
