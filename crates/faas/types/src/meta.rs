//! Object metadata shared by every stored kind

use crate::ids::ResourceKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identity, versioning and ownership metadata
///
/// `uid`, `resource_version`, `generation` and `creation_timestamp` are
/// assigned by the store; callers building a new object leave them at their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    pub namespace: String,

    #[serde(default = "Uuid::nil")]
    pub uid: Uuid,

    /// Optimistic-concurrency token, bumped on every write
    #[serde(default)]
    pub resource_version: u64,

    /// Bumped on spec changes only
    #[serde(default)]
    pub generation: u64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,

    #[serde(default = "Utc::now")]
    pub creation_timestamp: DateTime<Utc>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            uid: Uuid::nil(),
            resource_version: 0,
            generation: 0,
            labels: BTreeMap::new(),
            owner_references: Vec::new(),
            creation_timestamp: Utc::now(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.namespace, &self.name)
    }

    /// The owner reference flagged as the managing controller, if any
    pub fn controller_ref(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }
}

/// Back-reference from a dependent object to its owner
///
/// This is a non-owning link: the dependent's lifetime ends when it is
/// deleted, and the store cascades deletes along matching `uid`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: Uuid,
    #[serde(default)]
    pub controller: bool,
    #[serde(default)]
    pub block_owner_deletion: bool,
}
