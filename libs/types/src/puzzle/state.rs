//! Snapshot of every container plus the reservoir after a step.

use crate::puzzle::container::Container;
use crate::puzzle::reservoir::ReservoirSnapshot;

/// Cloned view of a strategy's containers and reservoir at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct ProblemState {
    pub containers: Vec<Container>,
    pub reservoir: ReservoirSnapshot,
}

impl ProblemState {
    pub fn new(containers: Vec<Container>, reservoir: ReservoirSnapshot) -> Self {
        Self {
            containers,
            reservoir,
        }
    }

    /// True when both states hold the same containers (matched by name and
    /// capacity) at the same fill levels. Reservoir counters are ignored.
    pub fn same_container_state(&self, other: &ProblemState) -> bool {
        self.containers.len() == other.containers.len()
            && self.containers.iter().all(|mine| {
                other.containers.iter().any(|theirs| {
                    theirs.name() == mine.name()
                        && theirs.capacity() == mine.capacity()
                        && theirs.fill() == mine.fill()
                })
            })
    }

    /// Look up a container by name
    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.name() == name)
    }
}
