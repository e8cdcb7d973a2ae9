//! Worker pool driving the reconciler from the work queue

use crate::config::QueueConfig;
use crate::queue::{QueueItem, WorkQueue};
use faas_controller::{Action, InMemoryStore, ReconcileError, Reconciler, TriggerReason};
use faas_types::ResourceKey;
use std::sync::Arc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Scheduler state
pub struct Scheduler {
    config: QueueConfig,
    reconciler: Arc<Reconciler>,
    store: Arc<InMemoryStore>,
    queue: Arc<WorkQueue>,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(
        config: QueueConfig,
        reconciler: Arc<Reconciler>,
        store: Arc<InMemoryStore>,
        queue: Arc<WorkQueue>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            reconciler,
            store,
            queue,
            shutdown: CancellationToken::new(),
        })
    }

    /// Enqueue a Function for reconciliation
    pub async fn trigger(&self, key: ResourceKey, reason: TriggerReason) {
        self.queue.add(key, reason).await;
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Run workers and the resync loop until [`Scheduler::stop`]
    pub async fn start(self: Arc<Self>) {
        let workers = self.config.max_concurrent_reconciles.max(1);
        tracing::info!(workers, "Scheduler started");

        let mut handles = Vec::with_capacity(workers + 1);
        for id in 0..workers {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move { scheduler.worker(id).await }));
        }

        let resync = self.clone();
        handles.push(tokio::spawn(async move { resync.resync_loop().await }));

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Scheduler task panicked");
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Stop handing out work and cancel in-flight cycles
    pub fn stop(&self) {
        self.shutdown.cancel();
        self.queue.shutdown();
    }

    async fn worker(&self, id: usize) {
        while let Some(item) = self.queue.get().await {
            let key = item.key.clone();
            self.process(item).await;
            self.queue.done(&key).await;
        }
        tracing::debug!(worker = id, "Worker exiting");
    }

    /// Run one cycle under the configured deadline and schedule what follows
    async fn process(&self, item: QueueItem) {
        let QueueItem { key, reason } = item;
        let cancel = self.shutdown.child_token();

        let result = {
            let cycle = self.reconciler.reconcile(&key, reason, &cancel);
            tokio::pin!(cycle);

            tokio::select! {
                result = &mut cycle => result,
                _ = tokio::time::sleep(self.config.reconcile_timeout()) => {
                    tracing::warn!(
                        function = %key,
                        timeout_secs = self.config.reconcile_timeout_secs,
                        "Reconcile deadline exceeded, cancelling"
                    );
                    cancel.cancel();
                    cycle.await
                }
            }
        };

        match result {
            Ok(Action::RequeueAfter(delay)) => {
                self.queue.forget(&key).await;
                self.queue.add_after(key, TriggerReason::Timer, delay).await;
            }
            Ok(Action::AwaitChange) => self.queue.forget(&key).await,
            Err(ReconcileError::Cancelled) if self.shutdown.is_cancelled() => {}
            Err(_) => self.queue.add_rate_limited(key, reason).await,
        }
    }

    /// Enqueue every Function as a timer trigger, once now and then periodically
    async fn resync_loop(&self) {
        let mut ticker = interval(self.config.resync_interval());

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.store.list_functions(None).await {
                        Ok(functions) => {
                            tracing::debug!(count = functions.len(), "Resyncing functions");
                            for function in functions {
                                self.queue.add(function.key(), TriggerReason::Timer).await;
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "Resync listing failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use faas_controller::{
        ControllerConfig, FunctionStore, ResourceStore, StoreResult, UnitStore,
    };
    use faas_types::{ExecutionUnit, Function, FunctionSpec, LabelSelector, ObjectMeta};
    use std::time::Duration;

    /// Store whose unit listing never returns
    struct StuckStore(Arc<InMemoryStore>);

    #[async_trait]
    impl FunctionStore for StuckStore {
        async fn get_function(&self, key: &ResourceKey) -> StoreResult<Option<Function>> {
            self.0.get_function(key).await
        }

        async fn update_function_status(&self, function: &Function) -> StoreResult<Function> {
            self.0.update_function_status(function).await
        }
    }

    #[async_trait]
    impl UnitStore for StuckStore {
        async fn list_units(
            &self,
            _namespace: &str,
            _selector: &LabelSelector,
        ) -> StoreResult<Vec<ExecutionUnit>> {
            std::future::pending().await
        }

        async fn create_unit(&self, unit: ExecutionUnit) -> StoreResult<ExecutionUnit> {
            self.0.create_unit(unit).await
        }

        async fn delete_unit(&self, key: &ResourceKey) -> StoreResult<()> {
            self.0.delete_unit(key).await
        }
    }

    fn function(name: &str, replicas: u32) -> Function {
        Function::new(
            ObjectMeta::new("default", name),
            FunctionSpec::new("python:3.12", "print('hello')", replicas),
        )
    }

    fn scheduler_over(
        store: Arc<InMemoryStore>,
        reconcile_store: Arc<dyn ResourceStore>,
    ) -> Arc<Scheduler> {
        let config = QueueConfig {
            max_concurrent_reconciles: 2,
            ..Default::default()
        };
        let reconciler = Arc::new(Reconciler::new(reconcile_store, ControllerConfig::default()));
        let queue = Arc::new(WorkQueue::new(&config));
        Scheduler::new(config, reconciler, store, queue)
    }

    #[tokio::test]
    async fn test_triggered_function_converges() {
        let store = Arc::new(InMemoryStore::new());
        let f = store.apply_function(function("resize", 2)).await.unwrap();
        let scheduler = scheduler_over(store.clone(), store.clone());

        let running = tokio::spawn(scheduler.clone().start());
        scheduler.trigger(f.key(), TriggerReason::Change).await;

        let mut units = 0;
        for _ in 0..200 {
            units = store.list_units("default", &f.selector()).await.unwrap().len();
            if units == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(units, 2);

        scheduler.stop();
        running.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_cycle_and_backs_off() {
        let store = Arc::new(InMemoryStore::new());
        let f = store.apply_function(function("resize", 1)).await.unwrap();
        let scheduler = scheduler_over(store.clone(), Arc::new(StuckStore(store.clone())));

        scheduler
            .process(QueueItem {
                key: f.key(),
                reason: TriggerReason::Change,
            })
            .await;

        assert_eq!(scheduler.queue().num_requeues(&f.key()).await, 1);
        assert!(store.list_all_units().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_forgets_failures_and_requeues_later() {
        let store = Arc::new(InMemoryStore::new());
        let f = store.apply_function(function("resize", 1)).await.unwrap();
        let scheduler = scheduler_over(store.clone(), store.clone());

        scheduler.queue().add_rate_limited(f.key(), TriggerReason::Change).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let item = scheduler.queue().get().await.unwrap();

        scheduler.process(item).await;
        scheduler.queue().done(&f.key()).await;
        assert_eq!(scheduler.queue().num_requeues(&f.key()).await, 0);
        assert!(scheduler.queue().is_empty().await);

        // The requeue lands after the controller's requeue interval
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(scheduler.queue().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_changes_share_one_requeue_timer() {
        let store = Arc::new(InMemoryStore::new());
        let f = store.apply_function(function("resize", 1)).await.unwrap();
        let scheduler = scheduler_over(store.clone(), store.clone());
        let queue = scheduler.queue().clone();

        for _ in 0..3 {
            scheduler.trigger(f.key(), TriggerReason::Change).await;
            let item = queue.get().await.unwrap();
            scheduler.process(item).await;
            queue.done(&f.key()).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        // Only timer cycles from here on, one per requeue interval
        let deadline = tokio::time::Instant::now() + Duration::from_secs(600);
        let mut cycles = 0;
        while let Ok(Some(item)) = tokio::time::timeout_at(deadline, queue.get()).await {
            assert_eq!(item.reason, TriggerReason::Timer);
            scheduler.process(item).await;
            queue.done(&f.key()).await;
            cycles += 1;
        }
        assert_eq!(cycles, 2);
    }

    #[tokio::test]
    async fn test_missing_function_is_not_requeued() {
        let store = Arc::new(InMemoryStore::new());
        let scheduler = scheduler_over(store.clone(), store);
        let key = ResourceKey::new("default", "ghost");

        scheduler
            .process(QueueItem {
                key: key.clone(),
                reason: TriggerReason::Change,
            })
            .await;

        assert_eq!(scheduler.queue().num_requeues(&key).await, 0);
        assert!(scheduler.queue().is_empty().await);
    }
}
