//! Simulated execution platform
//!
//! Stands in for the system that actually runs units: moves them through
//! Pending, Running and a terminal phase by age, and tells the queue about
//! every transition so the owning Function is reconciled again.

use crate::config::PlatformConfig;
use crate::queue::WorkQueue;
use chrono::Duration;
use faas_controller::{Clock, InMemoryStore, StoreResult, SystemClock, TriggerReason};
use faas_types::{ExecutionUnit, ResourceKey, UnitPhase};
use rand::Rng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Drives unit phases forward on a timer
pub struct PlatformSimulator {
    store: Arc<InMemoryStore>,
    queue: Arc<WorkQueue>,
    config: PlatformConfig,
    clock: Arc<dyn Clock>,
}

impl PlatformSimulator {
    pub fn new(store: Arc<InMemoryStore>, queue: Arc<WorkQueue>, config: PlatformConfig) -> Self {
        Self::with_clock(store, queue, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<InMemoryStore>,
        queue: Arc<WorkQueue>,
        config: PlatformConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            queue,
            config,
            clock,
        }
    }

    /// Tick until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        if !self.config.enabled {
            tracing::info!("Platform simulator disabled");
            return;
        }

        let mut ticker =
            tokio::time::interval(std::time::Duration::from_millis(self.config.tick_interval_ms.max(1)));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::warn!(error = %err, "Platform simulation tick failed");
                    }
                }
            }
        }
    }

    /// Advance every unit that is due; returns the number of transitions
    pub async fn tick(&self) -> StoreResult<usize> {
        let now = self.clock.now();
        let mut transitions = 0;

        for unit in self.store.list_all_units().await? {
            let age = now - unit.metadata.creation_timestamp;
            let Some(next) = self.next_phase(&unit, age) else {
                continue;
            };

            let key = unit.metadata.key();
            match self.store.set_unit_phase(&key, next).await {
                Ok(_) => {}
                // Deleted by the controller since the listing
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }

            tracing::debug!(unit = %key, from = %unit.phase(), to = %next, "Unit phase changed");
            transitions += 1;

            if let Some(owner) = unit.metadata.controller_ref() {
                let owner_key = ResourceKey::new(&unit.metadata.namespace, &owner.name);
                self.queue.add(owner_key, TriggerReason::Change).await;
            }
        }

        Ok(transitions)
    }

    fn next_phase(&self, unit: &ExecutionUnit, age: Duration) -> Option<UnitPhase> {
        let start_delay = Duration::seconds(self.config.start_delay_secs as i64);
        let run_duration = Duration::seconds(self.config.run_duration_secs as i64);

        match unit.phase() {
            UnitPhase::Pending if age >= start_delay => Some(UnitPhase::Running),
            UnitPhase::Running if age >= run_duration => {
                if roll_failure(self.config.failure_rate) {
                    Some(UnitPhase::Failed)
                } else {
                    Some(UnitPhase::Succeeded)
                }
            }
            _ => None,
        }
    }
}

fn roll_failure(rate: f64) -> bool {
    rand::thread_rng().gen_bool(rate.clamp(0.0, 1.0))
}
