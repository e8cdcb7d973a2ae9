//! Reconcile workers and periodic resync

mod worker;

pub use worker::Scheduler;
