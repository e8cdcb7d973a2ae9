//! Observation classifier
//!
//! Splits a Function's units into active and completed sets by phase.

use faas_types::ExecutionUnit;
use tracing::warn;

/// Units observed for one Function in one cycle
#[derive(Debug, Clone, Default)]
pub struct Observation {
    /// Pending or Running
    pub active: Vec<ExecutionUnit>,
    /// Succeeded or Failed
    pub completed: Vec<ExecutionUnit>,
    /// Units in a phase this controller does not recognise
    pub unrecognised: usize,
}

impl Observation {
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

/// Partition units by lifecycle phase
///
/// Units in an unknown phase land in neither set.
pub fn classify(units: Vec<ExecutionUnit>) -> Observation {
    let mut observation = Observation::default();

    for unit in units {
        let phase = unit.phase();
        if phase.is_active() {
            observation.active.push(unit);
        } else if phase.is_completed() {
            observation.completed.push(unit);
        } else {
            warn!(unit = %unit.metadata.key(), %phase, "Unit in unrecognised phase, ignoring");
            observation.unrecognised += 1;
        }
    }

    observation
}
