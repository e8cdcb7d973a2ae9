//! Scaling planner
//!
//! Compares the active set against the desired replica count and decides
//! whether to create, delete, or leave the fleet alone.

use faas_types::{ExecutionUnit, UnitPhase};
use std::cmp::Ordering;

/// Scaling decision for one cycle
#[derive(Debug, Clone)]
pub enum ScalingPlan {
    /// Create this many new units
    ScaleUp { count: usize },

    /// Delete these units, in order
    ScaleDown { victims: Vec<ExecutionUnit> },

    /// Active count already matches the desired count
    Steady,
}

fn phase_rank(phase: UnitPhase) -> u8 {
    match phase {
        UnitPhase::Pending => 0,
        UnitPhase::Running => 1,
        _ => 2,
    }
}

/// Keep-preference order: Pending before Running, then oldest first
///
/// The unit name breaks exact timestamp ties so the order is total.
pub fn compare_active(a: &ExecutionUnit, b: &ExecutionUnit) -> Ordering {
    phase_rank(a.phase())
        .cmp(&phase_rank(b.phase()))
        .then_with(|| {
            a.metadata
                .creation_timestamp
                .cmp(&b.metadata.creation_timestamp)
        })
        .then_with(|| a.metadata.name.cmp(&b.metadata.name))
}

/// Sort active units into keep-preference order
pub fn sort_active(units: &mut [ExecutionUnit]) {
    units.sort_by(compare_active);
}

/// Decide the scaling action for `active` against `desired` replicas
///
/// On scale-down the first `desired` units in keep-preference order survive
/// and every unit after them is a victim.
pub fn plan(mut active: Vec<ExecutionUnit>, desired: u32) -> ScalingPlan {
    let desired = desired as usize;

    match active.len().cmp(&desired) {
        Ordering::Less => ScalingPlan::ScaleUp {
            count: desired - active.len(),
        },
        Ordering::Greater => {
            sort_active(&mut active);
            let victims = active.split_off(desired);
            ScalingPlan::ScaleDown { victims }
        }
        Ordering::Equal => ScalingPlan::Steady,
    }
}
