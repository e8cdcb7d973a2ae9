//! FaaS Controller - Reconciliation engine for function workloads
//!
//! Each cycle observes one Function and the execution units selected by its
//! labels, then takes at most one corrective step:
//!
//! - **Scale up** when fewer units are active than the spec asks for
//! - **Scale down** when more are active, dropping Running units before
//!   Pending ones and newer before older
//! - **Garbage collect** finished units past their retention window, only
//!   once the active count is already correct
//!
//! Status is written back with a read-modify-write that retries on
//! optimistic-concurrency conflicts. Cycles hold no state between runs.

#![deny(unsafe_code)]

pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod factory;
pub mod gc;
pub mod planner;
pub mod reconciler;
pub mod retry;
pub mod status;
pub mod store;

#[cfg(test)]
mod testing;

pub use classifier::{classify, Observation};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ControllerConfig, RetryConfig};
pub use error::{ReconcileError, StoreError, StoreResult};
pub use factory::WorkloadFactory;
pub use planner::{plan, ScalingPlan};
pub use reconciler::{Action, Reconciler, TriggerReason};
pub use retry::{retry_on_conflict, RetryError, RetryPolicy};
pub use status::{ObservedCounts, StatusReporter};
pub use store::{FunctionStore, InMemoryStore, ResourceStore, UnitStore};
