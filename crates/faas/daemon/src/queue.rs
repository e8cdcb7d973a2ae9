//! Trigger work queue
//!
//! Keys waiting to be reconciled. A key is queued at most once; a key that is
//! re-added while a worker holds it is parked and handed out again only after
//! that worker calls [`WorkQueue::done`], so two workers never reconcile the
//! same Function at the same time. Delayed adds keep a single pending timer
//! per key, the one due earliest.

use crate::config::QueueConfig;
use faas_controller::TriggerReason;
use faas_types::ResourceKey;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One unit of work handed to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub key: ResourceKey,
    pub reason: TriggerReason,
}

#[derive(Debug, Default)]
struct QueueState {
    /// Keys ready to be handed out, in arrival order
    ready: VecDeque<ResourceKey>,
    /// Keys waiting to be processed, queued or parked
    dirty: HashMap<ResourceKey, TriggerReason>,
    /// Keys currently held by a worker
    processing: HashSet<ResourceKey>,
    /// Consecutive failures per key
    failures: HashMap<ResourceKey, u32>,
    /// Pending delayed add per key
    waiting: HashMap<ResourceKey, Waiting>,
    /// Id handed to the next delayed-add timer
    next_timer: u64,
}

/// A delayed add that has not fired yet
#[derive(Debug, Clone, Copy)]
struct Waiting {
    due: Instant,
    timer: u64,
    reason: TriggerReason,
}

/// Deduplicating, rate-limited queue of Function keys
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    base_backoff: Duration,
    max_backoff: Duration,
    shutdown: CancellationToken,
}

impl WorkQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            shutdown: CancellationToken::new(),
        }
    }

    /// Queue `key` now
    pub async fn add(&self, key: ResourceKey, reason: TriggerReason) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let mut state = self.state.lock().await;
        if let Some(queued) = state.dirty.get_mut(&key) {
            *queued = merge(*queued, reason);
            return;
        }

        state.dirty.insert(key.clone(), reason);
        if state.processing.contains(&key) {
            return;
        }

        state.ready.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Queue `key` once `delay` has passed
    ///
    /// A key already waiting on an earlier or equal deadline keeps it; a
    /// sooner deadline replaces the pending one.
    pub async fn add_after(
        self: &Arc<Self>,
        key: ResourceKey,
        reason: TriggerReason,
        delay: Duration,
    ) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let due = Instant::now() + delay;
        let timer = {
            let mut state = self.state.lock().await;
            let reason = match state.waiting.get_mut(&key) {
                Some(pending) if pending.due <= due => {
                    pending.reason = merge(pending.reason, reason);
                    return;
                }
                Some(pending) => merge(pending.reason, reason),
                None => reason,
            };

            state.next_timer += 1;
            let timer = state.next_timer;
            state.waiting.insert(key.clone(), Waiting { due, timer, reason });
            timer
        };

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = queue.shutdown.cancelled() => {}
                _ = tokio::time::sleep_until(due) => queue.fire(key, timer).await,
            }
        });
    }

    /// Move a due key into the queue unless a sooner timer superseded this one
    async fn fire(&self, key: ResourceKey, timer: u64) {
        let mut state = self.state.lock().await;
        let reason = match state.waiting.get(&key) {
            Some(pending) if pending.timer == timer => pending.reason,
            _ => return,
        };
        state.waiting.remove(&key);
        drop(state);

        self.add(key, reason).await;
    }

    /// Queue `key` after its per-key failure backoff
    pub async fn add_rate_limited(self: &Arc<Self>, key: ResourceKey, reason: TriggerReason) {
        let failures = {
            let mut state = self.state.lock().await;
            let failures = state.failures.entry(key.clone()).or_insert(0);
            *failures += 1;
            *failures
        };

        let delay = self.backoff(failures);
        tracing::debug!(function = %key, failures, delay_ms = delay.as_millis() as u64, "Requeueing with backoff");
        self.add_after(key, reason, delay).await;
    }

    /// Clear the failure history of `key`
    pub async fn forget(&self, key: &ResourceKey) {
        self.state.lock().await.failures.remove(key);
    }

    /// Consecutive failures recorded for `key`
    pub async fn num_requeues(&self, key: &ResourceKey) -> u32 {
        self.state
            .lock()
            .await
            .failures
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Wait for the next key; `None` once the queue is shut down
    pub async fn get(&self) -> Option<QueueItem> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if self.shutdown.is_cancelled() {
                    return None;
                }
                if let Some(key) = state.ready.pop_front() {
                    let reason = state.dirty.remove(&key).unwrap_or(TriggerReason::Timer);
                    state.processing.insert(key.clone());
                    return Some(QueueItem { key, reason });
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = notified => {}
            }
        }
    }

    /// Release `key` after processing; parked re-adds become ready
    pub async fn done(&self, key: &ResourceKey) {
        let mut state = self.state.lock().await;
        state.processing.remove(key);
        if state.dirty.contains_key(key) {
            state.ready.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Keys ready to be handed out
    pub async fn len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stop handing out keys and drop pending delayed adds
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// A change outranks a timer so the cycle is logged with the stronger reason
fn merge(current: TriggerReason, incoming: TriggerReason) -> TriggerReason {
    match (current, incoming) {
        (TriggerReason::Change, _) | (_, TriggerReason::Change) => TriggerReason::Change,
        _ => TriggerReason::Timer,
    }
}
