//! Store trait definitions

use crate::error::StoreResult;
use async_trait::async_trait;
use faas_types::{ExecutionUnit, Function, LabelSelector, ResourceKey};

/// Combined store consumed by the reconciler
pub trait ResourceStore: FunctionStore + UnitStore + Send + Sync {}

impl<T> ResourceStore for T where T: FunctionStore + UnitStore + Send + Sync {}

/// Access to Function resources
#[async_trait]
pub trait FunctionStore: Send + Sync {
    /// Get a Function by key, `None` when it does not exist
    async fn get_function(&self, key: &ResourceKey) -> StoreResult<Option<Function>>;

    /// Replace the status sub-object of a Function
    ///
    /// The write is rejected with `StoreError::Conflict` unless
    /// `function.metadata.resource_version` matches the stored version, and
    /// with `StoreError::NotFound` when the Function no longer exists. Spec
    /// and metadata in the argument are ignored.
    async fn update_function_status(&self, function: &Function) -> StoreResult<Function>;
}

/// Access to execution units
#[async_trait]
pub trait UnitStore: Send + Sync {
    /// List units in a namespace whose labels match the selector
    async fn list_units(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StoreResult<Vec<ExecutionUnit>>;

    /// Create a unit; fails with `StoreError::AlreadyExists` on a name collision
    async fn create_unit(&self, unit: ExecutionUnit) -> StoreResult<ExecutionUnit>;

    /// Delete a unit; fails with `StoreError::NotFound` when it is already gone
    async fn delete_unit(&self, key: &ResourceKey) -> StoreResult<()>;
}
