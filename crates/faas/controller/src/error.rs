//! Error types for the controller

use faas_types::ResourceKey;
use thiserror::Error;

/// Store-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object with the same name already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Write was based on a stale resource version
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Object failed validation
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Backend could not be reached or failed the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a single reconcile cycle
///
/// A missing Function is not represented here: it ends the cycle successfully.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to fetch function {key}: {source}")]
    Fetch {
        key: ResourceKey,
        #[source]
        source: StoreError,
    },

    #[error("Failed to list units for {key}: {source}")]
    List {
        key: ResourceKey,
        #[source]
        source: StoreError,
    },

    #[error("Failed to create unit {unit}: {source}")]
    Create {
        unit: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to delete unit {unit}: {source}")]
    Delete {
        unit: String,
        #[source]
        source: StoreError,
    },

    #[error("Status update for {key} still conflicting after {attempts} attempts")]
    ConflictExhausted { key: ResourceKey, attempts: u32 },

    #[error("Failed to update status of {key}: {source}")]
    Status {
        key: ResourceKey,
        #[source]
        source: StoreError,
    },

    #[error("Reconcile cancelled")]
    Cancelled,
}

impl ReconcileError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReconcileError::Cancelled)
    }
}
