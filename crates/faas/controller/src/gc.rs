//! Garbage collection of finished units

use chrono::{DateTime, Duration, Utc};
use faas_types::ExecutionUnit;

/// Completed units whose age exceeds the retention window
///
/// Age is measured from the unit's creation timestamp. A unit exactly at the
/// window is kept; only strictly older units are returned.
pub fn expired_units(
    completed: &[ExecutionUnit],
    ttl_seconds: u32,
    now: DateTime<Utc>,
) -> Vec<&ExecutionUnit> {
    let ttl = Duration::seconds(i64::from(ttl_seconds));

    completed
        .iter()
        .filter(|unit| now - unit.metadata.creation_timestamp > ttl)
        .collect()
}
