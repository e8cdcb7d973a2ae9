//! Execution unit types
//!
//! An ExecutionUnit is one run of a Function. The controller creates and
//! deletes units; the execution platform alone moves them through phases.

use crate::meta::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single execution of a Function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    pub metadata: ObjectMeta,

    pub spec: UnitSpec,

    #[serde(default)]
    pub status: UnitStatus,
}

impl ExecutionUnit {
    pub fn phase(&self) -> UnitPhase {
        self.status.phase
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// What the execution platform should run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSpec {
    pub containers: Vec<Container>,

    pub restart_policy: RestartPolicy,
}

/// A container within a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,

    pub image: String,

    /// Full entry command, arguments included
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

/// Environment variable passed to a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Restart behaviour of a unit's containers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    Always,
    OnFailure,
    /// Run to completion exactly once
    #[default]
    Never,
}

/// Platform-observed state of a unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    #[serde(default)]
    pub phase: UnitPhase,
}

/// Lifecycle phase
///
/// `Unknown` absorbs any phase name this version does not recognise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl UnitPhase {
    /// Not yet finished
    pub fn is_active(&self) -> bool {
        matches!(self, UnitPhase::Pending | UnitPhase::Running)
    }

    /// Finished, successfully or not
    pub fn is_completed(&self) -> bool {
        matches!(self, UnitPhase::Succeeded | UnitPhase::Failed)
    }
}

impl fmt::Display for UnitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitPhase::Pending => "Pending",
            UnitPhase::Running => "Running",
            UnitPhase::Succeeded => "Succeeded",
            UnitPhase::Failed => "Failed",
            UnitPhase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}
