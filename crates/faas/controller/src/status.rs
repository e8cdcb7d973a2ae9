//! Status reporter
//!
//! Publishes the counts observed in a cycle onto the Function's status with a
//! read-modify-write under optimistic concurrency.

use crate::error::{ReconcileError, StoreError};
use crate::retry::{retry_on_conflict, RetryError, RetryPolicy};
use crate::store::FunctionStore;
use faas_types::{Function, FunctionStatus, LabelSelector, ResourceKey};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Counts observed during one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservedCounts {
    pub active: u32,
    pub completed: u32,
    /// Units created by this cycle
    pub created: u32,
}

impl ObservedCounts {
    /// Status derived from these counts on top of the current status
    pub fn apply_to(&self, current: &FunctionStatus, selector: &LabelSelector) -> FunctionStatus {
        FunctionStatus {
            replicas: self.active,
            active: self.active,
            completed: self.completed,
            created: current.created.saturating_add(self.created),
            selector: selector.to_string(),
        }
    }
}

/// Writes observed status back to the store
#[derive(Debug, Clone)]
pub struct StatusReporter {
    policy: RetryPolicy,
}

impl StatusReporter {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Re-fetch the Function, apply `counts` and write the status
    ///
    /// Returns `Ok(None)` when the Function disappeared before the write.
    pub async fn report<S>(
        &self,
        store: &S,
        key: &ResourceKey,
        counts: ObservedCounts,
        cancel: &CancellationToken,
    ) -> Result<Option<Function>, ReconcileError>
    where
        S: FunctionStore + ?Sized,
    {
        let result = retry_on_conflict(
            &self.policy,
            cancel,
            || async move {
                let fetched = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Interrupt::Cancelled),
                    fetched = store.get_function(key) => fetched.map_err(Interrupt::Store)?,
                };

                let Some(mut function) = fetched else {
                    return Ok(None);
                };

                function.status = counts.apply_to(&function.status, &function.selector());

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(Interrupt::Cancelled),
                    written = store.update_function_status(&function) => match written {
                        Ok(updated) => Ok(Some(updated)),
                        Err(StoreError::NotFound(_)) => Ok(None),
                        Err(e) => Err(Interrupt::Store(e)),
                    },
                }
            },
            |e| matches!(e, Interrupt::Store(StoreError::Conflict(_))),
        )
        .await;

        match result {
            Ok(updated) => {
                if let Some(function) = &updated {
                    debug!(
                        function = %key,
                        active = function.status.active,
                        completed = function.status.completed,
                        created = function.status.created,
                        "Status updated"
                    );
                }
                Ok(updated)
            }
            Err(RetryError::Exhausted { attempts, .. }) => Err(ReconcileError::ConflictExhausted {
                key: key.clone(),
                attempts,
            }),
            Err(RetryError::Cancelled) | Err(RetryError::Failed(Interrupt::Cancelled)) => {
                Err(ReconcileError::Cancelled)
            }
            Err(RetryError::Failed(Interrupt::Store(source))) => Err(ReconcileError::Status {
                key: key.clone(),
                source,
            }),
        }
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[derive(Debug)]
enum Interrupt {
    Cancelled,
    Store(StoreError),
}

impl std::fmt::Display for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interrupt::Cancelled => f.write_str("cancelled"),
            Interrupt::Store(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::testing::{function, ConflictingStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_report_writes_counts_and_selector() {
        let store = InMemoryStore::new();
        let f = store.apply_function(function("resize", 2)).await.unwrap();

        let counts = ObservedCounts {
            active: 2,
            completed: 1,
            created: 2,
        };
        let updated = StatusReporter::default()
            .report(&store, &f.key(), counts, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.status.replicas, 2);
        assert_eq!(updated.status.active, 2);
        assert_eq!(updated.status.completed, 1);
        assert_eq!(updated.status.created, 2);
        assert_eq!(updated.status.selector, "app=function,function=resize");
    }

    #[tokio::test]
    async fn test_created_accumulates() {
        let store = InMemoryStore::new();
        let f = store.apply_function(function("resize", 2)).await.unwrap();
        let reporter = StatusReporter::default();
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let counts = ObservedCounts {
                active: 0,
                completed: 0,
                created: 3,
            };
            reporter.report(&store, &f.key(), counts, &cancel).await.unwrap();
        }

        let current = store.get_function(&f.key()).await.unwrap().unwrap();
        assert_eq!(current.status.created, 6);
    }

    #[tokio::test]
    async fn test_missing_function_is_not_an_error() {
        let store = InMemoryStore::new();
        let result = StatusReporter::default()
            .report(
                &store,
                &ResourceKey::new("default", "gone"),
                ObservedCounts::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_conflict_then_success_keeps_latest_values() {
        let inner = Arc::new(InMemoryStore::new());
        let f = inner.apply_function(function("resize", 2)).await.unwrap();
        let store = ConflictingStore::new(inner.clone(), 1);

        let counts = ObservedCounts {
            active: 2,
            completed: 0,
            created: 0,
        };
        let updated = StatusReporter::default()
            .report(&store, &f.key(), counts, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.conflicts_raised(), 1);
        assert_eq!(updated.status.active, 2);

        // The concurrent writer's spec change survives the status write
        let current = inner.get_function(&f.key()).await.unwrap().unwrap();
        assert_eq!(current.spec.replicas, 3);
        assert_eq!(current.status.active, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_conflict_exhausts() {
        let inner = Arc::new(InMemoryStore::new());
        let f = inner.apply_function(function("resize", 2)).await.unwrap();
        let store = ConflictingStore::new(inner, u32::MAX);

        let err = StatusReporter::default()
            .report(&store, &f.key(), ObservedCounts::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::ConflictExhausted { attempts: 5, .. }
        ));
        assert_eq!(store.conflicts_raised(), 5);
    }

    #[tokio::test]
    async fn test_cancelled_before_write() {
        let store = InMemoryStore::new();
        let f = store.apply_function(function("resize", 2)).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = StatusReporter::default()
            .report(&store, &f.key(), ObservedCounts::default(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
