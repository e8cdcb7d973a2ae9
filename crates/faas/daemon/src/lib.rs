//! FaaS Daemon library
//!
//! This module provides the core components for the FaaS daemon:
//! - REST API handlers
//! - Trigger work queue and reconcile workers
//! - Simulated execution platform
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod platform;
pub mod queue;
pub mod scheduler;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use queue::WorkQueue;
pub use scheduler::Scheduler;
pub use server::Server;
