//! FaaS Types - Core types for function workloads
//!
//! A `Function` declares what should run (image, code, arguments, environment)
//! and how many copies of it should be active at once. The controller turns
//! that declaration into `ExecutionUnit`s and keeps them converged.
//!
//! ## Key Concepts
//!
//! - **Function**: Desired-state resource plus system-observed status
//! - **ExecutionUnit**: One running or finished execution of a Function
//! - **Labels**: Ownership is discovered by label selector, never by a stored list
//! - **ObjectMeta**: Shared identity, versioning and ownership metadata

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod function;
pub mod ids;
pub mod labels;
pub mod meta;
pub mod unit;

// Re-export main types
pub use function::{Function, FunctionSpec, FunctionStatus, DEFAULT_TTL_SECONDS_AFTER_FINISHED};
pub use ids::{KeyParseError, ResourceKey};
pub use labels::{labels_for_function, LabelSelector, APP_LABEL, APP_LABEL_VALUE, FUNCTION_LABEL};
pub use meta::{ObjectMeta, OwnerReference};
pub use unit::{Container, EnvVar, ExecutionUnit, RestartPolicy, UnitPhase, UnitSpec, UnitStatus};
