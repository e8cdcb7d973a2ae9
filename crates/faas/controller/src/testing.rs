//! Shared test fixtures

use crate::error::{StoreError, StoreResult};
use crate::factory::WorkloadFactory;
use crate::store::{FunctionStore, InMemoryStore, UnitStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use faas_types::{
    labels_for_function, ExecutionUnit, Function, FunctionSpec, LabelSelector, ObjectMeta,
    ResourceKey, RestartPolicy, UnitPhase, UnitSpec, UnitStatus,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A Function named `name` in `default`
pub fn function(name: &str, replicas: u32) -> Function {
    let mut metadata = ObjectMeta::new("default", name);
    metadata.uid = Uuid::new_v4();
    Function::new(
        metadata,
        FunctionSpec::new("python:3.12", "print('hello')", replicas),
    )
}

/// A bare unit created `created_offset_secs` after [`base_time`]
pub fn unit(name: &str, phase: UnitPhase, created_offset_secs: i64) -> ExecutionUnit {
    let mut metadata = ObjectMeta::new("default", name);
    metadata.labels = labels_for_function("test");
    metadata.creation_timestamp = base_time() + Duration::seconds(created_offset_secs);
    ExecutionUnit {
        metadata,
        spec: UnitSpec {
            containers: Vec::new(),
            restart_policy: RestartPolicy::Never,
        },
        status: UnitStatus { phase },
    }
}

/// Create a unit for `owner` through the store and move it to `phase`
pub async fn seed_unit(store: &InMemoryStore, owner: &Function, phase: UnitPhase) -> ExecutionUnit {
    let created = store
        .create_unit(WorkloadFactory::default().build(owner))
        .await
        .unwrap();
    store
        .set_unit_phase(&created.metadata.key(), phase)
        .await
        .unwrap()
}

/// Store wrapper that records unit writes and can inject failures
#[derive(Debug)]
pub struct RecordingStore {
    inner: Arc<InMemoryStore>,
    creates: AtomicU32,
    deletes: Mutex<Vec<String>>,
    create_budget: AtomicU32,
    collisions: AtomicU32,
    fail_deletes: AtomicBool,
    fail_lists: AtomicBool,
    hang_lists: AtomicBool,
}

impl RecordingStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            creates: AtomicU32::new(0),
            deletes: Mutex::new(Vec::new()),
            create_budget: AtomicU32::new(u32::MAX),
            collisions: AtomicU32::new(0),
            fail_deletes: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            hang_lists: AtomicBool::new(false),
        }
    }

    /// Successful creates so far
    pub fn creates(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    /// Keys of successfully deleted units, in call order
    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn fail_creates_after(&self, successes: u32) {
        self.create_budget.store(successes, Ordering::SeqCst);
    }

    /// Answer the next `count` creates with `AlreadyExists`
    pub fn collide_names(&self, count: u32) {
        self.collisions.store(count, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn fail_lists(&self) {
        self.fail_lists.store(true, Ordering::SeqCst);
    }

    /// Make every list call wait forever
    pub fn hang_lists(&self) {
        self.hang_lists.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl FunctionStore for RecordingStore {
    async fn get_function(&self, key: &ResourceKey) -> StoreResult<Option<Function>> {
        self.inner.get_function(key).await
    }

    async fn update_function_status(&self, function: &Function) -> StoreResult<Function> {
        self.inner.update_function_status(function).await
    }
}

#[async_trait]
impl UnitStore for RecordingStore {
    async fn list_units(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StoreResult<Vec<ExecutionUnit>> {
        if self.hang_lists.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected list failure".to_string()));
        }
        self.inner.list_units(namespace, selector).await
    }

    async fn create_unit(&self, unit: ExecutionUnit) -> StoreResult<ExecutionUnit> {
        let collided = self
            .collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if collided {
            return Err(StoreError::AlreadyExists(unit.metadata.key().to_string()));
        }

        let allowed = self
            .create_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StoreError::Unavailable("injected create failure".to_string()));
        }

        let created = self.inner.create_unit(unit).await?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn delete_unit(&self, key: &ResourceKey) -> StoreResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected delete failure".to_string()));
        }
        self.inner.delete_unit(key).await?;
        self.deletes.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Store wrapper whose status writes lose a race against a concurrent
/// spec edit a fixed number of times
#[derive(Debug)]
pub struct ConflictingStore {
    inner: Arc<InMemoryStore>,
    remaining: AtomicU32,
    raised: AtomicU32,
}

impl ConflictingStore {
    pub fn new(inner: Arc<InMemoryStore>, conflicts: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(conflicts),
            raised: AtomicU32::new(0),
        }
    }

    pub fn conflicts_raised(&self) -> u32 {
        self.raised.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FunctionStore for ConflictingStore {
    async fn get_function(&self, key: &ResourceKey) -> StoreResult<Option<Function>> {
        self.inner.get_function(key).await
    }

    async fn update_function_status(&self, function: &Function) -> StoreResult<Function> {
        let conflict = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if conflict {
            // Someone else edits the spec between our read and our write
            let mut edited = function.clone();
            edited.spec.replicas = 3;
            edited.metadata.resource_version = 0;
            self.inner.apply_function(edited).await?;
            self.raised.fetch_add(1, Ordering::SeqCst);
        }

        self.inner.update_function_status(function).await
    }
}

#[async_trait]
impl UnitStore for ConflictingStore {
    async fn list_units(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StoreResult<Vec<ExecutionUnit>> {
        self.inner.list_units(namespace, selector).await
    }

    async fn create_unit(&self, unit: ExecutionUnit) -> StoreResult<ExecutionUnit> {
        self.inner.create_unit(unit).await
    }

    async fn delete_unit(&self, key: &ResourceKey) -> StoreResult<()> {
        self.inner.delete_unit(key).await
    }
}
