//! Reconciliation loop
//!
//! One call to [`Reconciler::reconcile`] is one cycle for one Function:
//! fetch desired state, list owned units, classify, then exactly one of
//! scale-up, scale-down or garbage-collect, then publish status and ask to be
//! requeued. Nothing is remembered between cycles.

use crate::classifier::{classify, Observation};
use crate::clock::{Clock, SystemClock};
use crate::config::ControllerConfig;
use crate::error::{ReconcileError, StoreError};
use crate::factory::WorkloadFactory;
use crate::gc::expired_units;
use crate::planner::{plan, ScalingPlan};
use crate::status::{ObservedCounts, StatusReporter};
use crate::store::ResourceStore;
use faas_types::{ExecutionUnit, Function, ResourceKey};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Why a cycle was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerReason {
    /// The Function or one of its units changed
    Change,
    /// A requested requeue or periodic resync came due
    Timer,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerReason::Change => f.write_str("change"),
            TriggerReason::Timer => f.write_str("timer"),
        }
    }
}

/// What the trigger should do after a successful cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Run again for the same key after this delay
    RequeueAfter(Duration),
    /// Nothing to do until the next change
    AwaitChange,
}

/// The step a cycle took after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    ScaleUp,
    ScaleDown,
    GarbageCollect,
    NoOp,
}

/// Runs reconcile cycles against a store
pub struct Reconciler {
    store: Arc<dyn ResourceStore>,
    factory: WorkloadFactory,
    status: StatusReporter,
    clock: Arc<dyn Clock>,
    config: ControllerConfig,
}

impl Reconciler {
    /// Create a reconciler on the system clock
    pub fn new(store: Arc<dyn ResourceStore>, config: ControllerConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a reconciler measuring unit ages against `clock`
    pub fn with_clock(
        store: Arc<dyn ResourceStore>,
        config: ControllerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            factory: WorkloadFactory::new(config.runtime_command.clone()),
            status: StatusReporter::new(config.conflict_retry.policy()),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run one cycle for `key`
    ///
    /// Every store call races `cancel`; a fired token ends the cycle with
    /// [`ReconcileError::Cancelled`].
    pub async fn reconcile(
        &self,
        key: &ResourceKey,
        reason: TriggerReason,
        cancel: &CancellationToken,
    ) -> Result<Action, ReconcileError> {
        let span = info_span!("reconcile", function = %key, reason = %reason);
        let result = self.run_cycle(key, cancel).instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok(action) => debug!(?action, "Reconcile finished"),
            Err(e) if e.is_cancelled() => warn!("Reconcile cancelled"),
            Err(e) => error!(error = %e, "Reconcile failed"),
        });
        result
    }

    async fn run_cycle(
        &self,
        key: &ResourceKey,
        cancel: &CancellationToken,
    ) -> Result<Action, ReconcileError> {
        // Fetch
        let fetched = guard(cancel, self.store.get_function(key))
            .await?
            .map_err(|source| ReconcileError::Fetch {
                key: key.clone(),
                source,
            })?;

        let Some(function) = fetched else {
            info!("Function not found, ignoring since it must have been deleted");
            return Ok(Action::AwaitChange);
        };

        // List
        let units = guard(
            cancel,
            self.store
                .list_units(&function.metadata.namespace, &function.selector()),
        )
        .await?
        .map_err(|source| ReconcileError::List {
            key: key.clone(),
            source,
        })?;

        // Classify
        let observation = classify(units);
        let counts = ObservedCounts {
            active: observation.active_count() as u32,
            completed: observation.completed_count() as u32,
            created: 0,
        };

        info!(
            active = counts.active,
            desired = function.spec.replicas,
            completed = counts.completed,
            "Unit counts"
        );

        let (step, created) = self.converge(&function, observation, cancel).await?;
        debug!(?step, created, "Convergence step complete");

        // Report status
        let counts = ObservedCounts { created, ..counts };
        if self.status.report(self.store.as_ref(), key, counts, cancel).await?.is_none() {
            info!("Function deleted during reconcile, skipping requeue");
            return Ok(Action::AwaitChange);
        }

        Ok(Action::RequeueAfter(self.config.requeue_after()))
    }

    /// Apply the single corrective step for this cycle
    ///
    /// Returns the step taken and how many units were created.
    async fn converge(
        &self,
        function: &Function,
        observation: Observation,
        cancel: &CancellationToken,
    ) -> Result<(Step, u32), ReconcileError> {
        match plan(observation.active, function.spec.replicas) {
            ScalingPlan::ScaleUp { count } => {
                info!(count, "Scaling up");
                for _ in 0..count {
                    self.create_unit(function, cancel).await?;
                }
                Ok((Step::ScaleUp, count as u32))
            }
            ScalingPlan::ScaleDown { victims } => {
                info!(count = victims.len(), "Scaling down");
                for unit in &victims {
                    info!(unit = %unit.metadata.key(), phase = %unit.phase(), "Deleting active unit");
                    self.delete_unit(unit, cancel).await?;
                }
                Ok((Step::ScaleDown, 0))
            }
            ScalingPlan::Steady => {
                let ttl = function.spec.ttl_seconds_after_finished();
                let expired = expired_units(&observation.completed, ttl, self.clock.now());
                if expired.is_empty() {
                    return Ok((Step::NoOp, 0));
                }

                for unit in expired {
                    info!(unit = %unit.metadata.key(), ttl, "Deleting completed unit");
                    self.delete_unit(unit, cancel).await?;
                }
                Ok((Step::GarbageCollect, 0))
            }
        }
    }

    /// Create one unit, drawing a new name when the generated one is taken
    async fn create_unit(
        &self,
        function: &Function,
        cancel: &CancellationToken,
    ) -> Result<ExecutionUnit, ReconcileError> {
        let attempts = self.config.name_collision_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let unit = self.factory.build(function);
            let name = unit.metadata.name.clone();

            match guard(cancel, self.store.create_unit(unit)).await? {
                Ok(created) => {
                    info!(unit = %created.metadata.key(), "Created unit");
                    return Ok(created);
                }
                Err(StoreError::AlreadyExists(_)) if attempt < attempts => {
                    warn!(unit = %name, attempt, "Generated unit name already taken, retrying");
                }
                Err(source) => return Err(ReconcileError::Create { unit: name, source }),
            }
        }
    }

    /// Delete one unit; a unit that is already gone counts as deleted
    async fn delete_unit(
        &self,
        unit: &ExecutionUnit,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let key = unit.metadata.key();
        match guard(cancel, self.store.delete_unit(&key)).await? {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => {
                debug!(unit = %key, "Unit already deleted");
                Ok(())
            }
            Err(source) => Err(ReconcileError::Delete {
                unit: key.to_string(),
                source,
            }),
        }
    }
}

/// Race `fut` against cancellation
async fn guard<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, ReconcileError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled),
        out = fut => Ok(out),
    }
}
