//! Storage layer for the controller
//!
//! The reconciler only sees the traits; the in-memory store backs the daemon
//! and the tests.

mod memory;
mod traits;

pub use memory::InMemoryStore;
pub use traits::{FunctionStore, ResourceStore, UnitStore};
