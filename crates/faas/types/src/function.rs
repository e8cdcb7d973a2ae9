//! Function resource
//!
//! The desired-state declaration of a function workload together with the
//! status last observed by the controller.

use crate::ids::ResourceKey;
use crate::labels::LabelSelector;
use crate::meta::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Retention applied to finished units when the spec leaves it unset
pub const DEFAULT_TTL_SECONDS_AFTER_FINISHED: u32 = 300;

/// A function workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub metadata: ObjectMeta,

    pub spec: FunctionSpec,

    #[serde(default)]
    pub status: FunctionStatus,
}

impl Function {
    pub fn new(metadata: ObjectMeta, spec: FunctionSpec) -> Self {
        Self {
            metadata,
            spec,
            status: FunctionStatus::default(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.metadata.key()
    }

    /// Selector used to discover this Function's units
    pub fn selector(&self) -> LabelSelector {
        LabelSelector::for_function(&self.metadata.name)
    }
}

/// User-supplied desired state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    /// Container image providing the language runtime
    pub runtime_image: String,

    /// Source payload, interpreted by the runtime image
    pub code: String,

    /// Name of the entry-point handler
    #[serde(default)]
    pub handler: String,

    /// Arguments appended after the code argument
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env_variables: BTreeMap<String, String>,

    /// Opaque dependency list handed to the runtime
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Number of units that should be active at once
    pub replicas: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_finished: Option<u32>,
}

impl FunctionSpec {
    pub fn new(runtime_image: impl Into<String>, code: impl Into<String>, replicas: u32) -> Self {
        Self {
            runtime_image: runtime_image.into(),
            code: code.into(),
            handler: String::new(),
            args: Vec::new(),
            env_variables: BTreeMap::new(),
            dependencies: Vec::new(),
            replicas,
            ttl_seconds_after_finished: None,
        }
    }

    /// Retention window for finished units, with the default applied
    pub fn ttl_seconds_after_finished(&self) -> u32 {
        self.ttl_seconds_after_finished
            .unwrap_or(DEFAULT_TTL_SECONDS_AFTER_FINISHED)
    }
}

/// Observed state, written only by the controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FunctionStatus {
    pub replicas: u32,
    pub active: u32,
    pub completed: u32,
    /// Units created over the Function's lifetime
    pub created: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub selector: String,
}
