//! In-memory store implementation
//!
//! Mirrors the behaviour the reconciler relies on from a real resource store:
//! store-assigned identity and timestamps, monotonic resource versions with
//! compare-and-swap status writes, label-selector listing, and cascading
//! deletion of units along owner references.

use super::traits::*;
use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use faas_types::{ExecutionUnit, Function, LabelSelector, ResourceKey, UnitPhase, UnitStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory store for development and testing
#[derive(Debug)]
pub struct InMemoryStore {
    functions: Arc<RwLock<HashMap<ResourceKey, Function>>>,
    units: Arc<RwLock<HashMap<ResourceKey, ExecutionUnit>>>,
    revision: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create a new in-memory store on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a new in-memory store stamping creation times from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            functions: Arc::new(RwLock::new(HashMap::new())),
            units: Arc::new(RwLock::new(HashMap::new())),
            revision: Arc::new(AtomicU64::new(0)),
            clock,
        }
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Create a Function or update its spec and labels
    ///
    /// A non-zero `resource_version` on the argument turns the update into a
    /// compare-and-swap. Status is never taken from the argument.
    pub async fn apply_function(&self, function: Function) -> StoreResult<Function> {
        let key = function.key();
        let mut functions = self.functions.write().await;

        let stored = match functions.get(&key) {
            Some(existing) => {
                let requested = function.metadata.resource_version;
                if requested != 0 && requested != existing.metadata.resource_version {
                    return Err(StoreError::Conflict(format!(
                        "function {} is at version {}, update was based on {}",
                        key, existing.metadata.resource_version, requested
                    )));
                }

                let mut updated = existing.clone();
                if updated.spec != function.spec {
                    updated.spec = function.spec;
                    updated.metadata.generation += 1;
                }
                updated.metadata.labels = function.metadata.labels;
                updated.metadata.resource_version = self.next_revision();
                updated
            }
            None => self.admit(function),
        };

        functions.insert(key, stored.clone());
        Ok(stored)
    }

    /// Create a Function, failing if the key is already taken
    pub async fn create_function(&self, function: Function) -> StoreResult<Function> {
        let key = function.key();
        let mut functions = self.functions.write().await;
        if functions.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("function {}", key)));
        }

        let created = self.admit(function);
        functions.insert(key, created.clone());
        Ok(created)
    }

    /// Stamp store-owned identity onto a new Function
    fn admit(&self, mut function: Function) -> Function {
        function.metadata.uid = Uuid::new_v4();
        function.metadata.generation = 1;
        function.metadata.resource_version = self.next_revision();
        function.metadata.creation_timestamp = self.clock.now();
        function.status = Default::default();
        function
    }

    /// List Functions, optionally restricted to one namespace
    pub async fn list_functions(&self, namespace: Option<&str>) -> StoreResult<Vec<Function>> {
        let functions = self.functions.read().await;
        let mut listed: Vec<Function> = functions
            .values()
            .filter(|f| namespace.map_or(true, |ns| f.metadata.namespace == ns))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(listed)
    }

    /// Delete a Function and every unit it controls
    pub async fn delete_function(&self, key: &ResourceKey) -> StoreResult<bool> {
        let removed = {
            let mut functions = self.functions.write().await;
            functions.remove(key)
        };

        let Some(function) = removed else {
            return Ok(false);
        };

        let uid = function.metadata.uid;
        let mut units = self.units.write().await;
        let before = units.len();
        units.retain(|_, unit| {
            !unit
                .metadata
                .owner_references
                .iter()
                .any(|owner| owner.uid == uid)
        });

        tracing::debug!(
            function = %key,
            cascaded = before - units.len(),
            "Deleted function and dependent units"
        );

        Ok(true)
    }

    /// Get a single unit
    pub async fn get_unit(&self, key: &ResourceKey) -> StoreResult<Option<ExecutionUnit>> {
        let units = self.units.read().await;
        Ok(units.get(key).cloned())
    }

    /// List every unit in the store
    pub async fn list_all_units(&self) -> StoreResult<Vec<ExecutionUnit>> {
        let units = self.units.read().await;
        let mut listed: Vec<ExecutionUnit> = units.values().cloned().collect();
        listed.sort_by(|a, b| a.metadata.key().cmp(&b.metadata.key()));
        Ok(listed)
    }

    /// Move a unit to a new phase (execution platform side)
    pub async fn set_unit_phase(
        &self,
        key: &ResourceKey,
        phase: UnitPhase,
    ) -> StoreResult<ExecutionUnit> {
        let mut units = self.units.write().await;
        let unit = units
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("unit {}", key)))?;

        unit.status.phase = phase;
        unit.metadata.resource_version = self.next_revision();
        Ok(unit.clone())
    }
}

#[async_trait]
impl FunctionStore for InMemoryStore {
    async fn get_function(&self, key: &ResourceKey) -> StoreResult<Option<Function>> {
        let functions = self.functions.read().await;
        Ok(functions.get(key).cloned())
    }

    async fn update_function_status(&self, function: &Function) -> StoreResult<Function> {
        let key = function.key();
        let mut functions = self.functions.write().await;
        let stored = functions
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("function {}", key)))?;

        if stored.metadata.resource_version != function.metadata.resource_version {
            return Err(StoreError::Conflict(format!(
                "function {} is at version {}, status update was based on {}",
                key, stored.metadata.resource_version, function.metadata.resource_version
            )));
        }

        stored.status = function.status.clone();
        stored.metadata.resource_version = self.next_revision();
        Ok(stored.clone())
    }
}

#[async_trait]
impl UnitStore for InMemoryStore {
    async fn list_units(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StoreResult<Vec<ExecutionUnit>> {
        let units = self.units.read().await;
        let mut listed: Vec<ExecutionUnit> = units
            .values()
            .filter(|u| u.metadata.namespace == namespace && selector.matches(&u.metadata.labels))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(listed)
    }

    async fn create_unit(&self, unit: ExecutionUnit) -> StoreResult<ExecutionUnit> {
        let key = unit.metadata.key();
        if unit.metadata.name.is_empty() || unit.metadata.namespace.is_empty() {
            return Err(StoreError::InvalidData(format!(
                "unit {} needs both a name and a namespace",
                key
            )));
        }

        let mut units = self.units.write().await;
        if units.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("unit {}", key)));
        }

        let mut created = unit;
        created.metadata.uid = Uuid::new_v4();
        created.metadata.generation = 1;
        created.metadata.resource_version = self.next_revision();
        created.metadata.creation_timestamp = self.clock.now();
        created.status = UnitStatus::default();

        units.insert(key, created.clone());
        Ok(created)
    }

    async fn delete_unit(&self, key: &ResourceKey) -> StoreResult<()> {
        let mut units = self.units.write().await;
        units
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("unit {}", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use faas_types::{
        labels_for_function, FunctionSpec, ObjectMeta, OwnerReference, RestartPolicy, UnitSpec,
    };

    fn function(name: &str, replicas: u32) -> Function {
        Function::new(
            ObjectMeta::new("default", name),
            FunctionSpec::new("python:3.12", "print('hi')", replicas),
        )
    }

    fn unit_of(owner: &Function, name: &str) -> ExecutionUnit {
        let mut metadata = ObjectMeta::new("default", name);
        metadata.labels = labels_for_function(&owner.metadata.name);
        metadata.owner_references = vec![OwnerReference {
            api_version: "faas.dev/v1alpha1".to_string(),
            kind: "Function".to_string(),
            name: owner.metadata.name.clone(),
            uid: owner.metadata.uid,
            controller: true,
            block_owner_deletion: true,
        }];
        ExecutionUnit {
            metadata,
            spec: UnitSpec {
                containers: vec![],
                restart_policy: RestartPolicy::Never,
            },
            status: UnitStatus::default(),
        }
    }

    #[tokio::test]
    async fn test_apply_assigns_identity_and_bumps_generation() {
        let store = InMemoryStore::new();

        let created = store.apply_function(function("resize", 1)).await.unwrap();
        assert!(!created.metadata.uid.is_nil());
        assert_eq!(created.metadata.generation, 1);

        let mut changed = function("resize", 3);
        changed.metadata.resource_version = created.metadata.resource_version;
        let updated = store.apply_function(changed).await.unwrap();
        assert_eq!(updated.metadata.uid, created.metadata.uid);
        assert_eq!(updated.metadata.generation, 2);
        assert!(updated.metadata.resource_version > created.metadata.resource_version);

        // Same spec again leaves the generation alone
        let again = store.apply_function(function("resize", 3)).await.unwrap();
        assert_eq!(again.metadata.generation, 2);
    }

    #[tokio::test]
    async fn test_create_function_is_create_only() {
        let store = Arc::new(InMemoryStore::new());

        let racers: Vec<_> = [1, 5]
            .into_iter()
            .map(|replicas| {
                let store = store.clone();
                tokio::spawn(async move { store.create_function(function("resize", replicas)).await })
            })
            .collect();

        let mut winners = Vec::new();
        for racer in racers {
            match racer.await.unwrap() {
                Ok(created) => winners.push(created),
                Err(e) => assert!(e.is_already_exists(), "{e}"),
            }
        }
        assert_eq!(winners.len(), 1);

        let stored = store.get_function(&winners[0].key()).await.unwrap().unwrap();
        assert_eq!(stored.spec.replicas, winners[0].spec.replicas);
        assert_eq!(stored.metadata.uid, winners[0].metadata.uid);
    }

    #[tokio::test]
    async fn test_status_update_is_compare_and_swap() {
        let store = InMemoryStore::new();
        let created = store.apply_function(function("resize", 1)).await.unwrap();

        let mut first = created.clone();
        first.status.active = 1;
        let written = store.update_function_status(&first).await.unwrap();
        assert_eq!(written.status.active, 1);

        // Second writer still holds the old version
        let mut stale = created.clone();
        stale.status.active = 7;
        let err = store.update_function_status(&stale).await.unwrap_err();
        assert!(err.is_conflict());

        let current = store.get_function(&created.key()).await.unwrap().unwrap();
        assert_eq!(current.status.active, 1);
    }

    #[tokio::test]
    async fn test_status_update_leaves_spec_untouched() {
        let store = InMemoryStore::new();
        let created = store.apply_function(function("resize", 1)).await.unwrap();

        let mut write = created.clone();
        write.spec.replicas = 99;
        write.status.completed = 4;
        store.update_function_status(&write).await.unwrap();

        let current = store.get_function(&created.key()).await.unwrap().unwrap();
        assert_eq!(current.spec.replicas, 1);
        assert_eq!(current.status.completed, 4);
    }

    #[tokio::test]
    async fn test_list_units_by_selector_and_namespace() {
        let store = InMemoryStore::new();
        let resize = store.apply_function(function("resize", 1)).await.unwrap();
        let thumb = store.apply_function(function("thumb", 1)).await.unwrap();

        store.create_unit(unit_of(&resize, "resize-function-aaaaa")).await.unwrap();
        store.create_unit(unit_of(&thumb, "thumb-function-bbbbb")).await.unwrap();

        let mut foreign = unit_of(&resize, "resize-function-ccccc");
        foreign.metadata.namespace = "other".to_string();
        store.create_unit(foreign).await.unwrap();

        let listed = store
            .list_units("default", &resize.selector())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name(), "resize-function-aaaaa");
    }

    #[tokio::test]
    async fn test_create_unit_rejects_duplicates_and_stamps_time() {
        let clock = ManualClock::new(chrono::Utc::now());
        let store = InMemoryStore::with_clock(Arc::new(clock.clone()));
        let resize = store.apply_function(function("resize", 1)).await.unwrap();

        let mut unit = unit_of(&resize, "resize-function-aaaaa");
        unit.status.phase = UnitPhase::Succeeded;
        let created = store.create_unit(unit.clone()).await.unwrap();
        assert_eq!(created.metadata.creation_timestamp, clock.now());
        assert_eq!(created.phase(), UnitPhase::Pending);

        let err = store.create_unit(unit).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_delete_function_cascades_to_owned_units() {
        let store = InMemoryStore::new();
        let resize = store.apply_function(function("resize", 1)).await.unwrap();
        let thumb = store.apply_function(function("thumb", 1)).await.unwrap();

        store.create_unit(unit_of(&resize, "resize-function-aaaaa")).await.unwrap();
        store.create_unit(unit_of(&thumb, "thumb-function-bbbbb")).await.unwrap();

        assert!(store.delete_function(&resize.key()).await.unwrap());
        assert!(!store.delete_function(&resize.key()).await.unwrap());

        let remaining = store.list_all_units().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name(), "thumb-function-bbbbb");
    }

    #[tokio::test]
    async fn test_delete_missing_unit_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .delete_unit(&ResourceKey::new("default", "nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
