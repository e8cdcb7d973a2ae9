//! Controller configuration

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the reconcile loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Delay before a successfully reconciled Function is checked again
    #[serde(default = "default_requeue_after")]
    pub requeue_after_secs: u64,

    /// Command prefix that runs the code payload inside the runtime image
    #[serde(default = "default_runtime_command")]
    pub runtime_command: Vec<String>,

    /// Extra attempts with a fresh name when a generated unit name is taken
    #[serde(default = "default_name_collision_retries")]
    pub name_collision_retries: u32,

    /// Retry policy for conflicting status writes
    #[serde(default)]
    pub conflict_retry: RetryConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            requeue_after_secs: default_requeue_after(),
            runtime_command: default_runtime_command(),
            name_collision_retries: default_name_collision_retries(),
            conflict_retry: RetryConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_after_secs)
    }
}

/// Bounded retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    #[serde(default = "default_retry_steps")]
    pub steps: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub initial_delay_ms: u64,

    /// Delay multiplier between attempts
    #[serde(default = "default_retry_factor")]
    pub factor: f64,

    /// Fraction of the delay added as random jitter
    #[serde(default = "default_retry_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            steps: default_retry_steps(),
            initial_delay_ms: default_retry_delay_ms(),
            factor: default_retry_factor(),
            jitter: default_retry_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            steps: self.steps.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            factor: self.factor,
            jitter: self.jitter,
        }
    }
}

// Default value helpers
fn default_requeue_after() -> u64 {
    300
}

fn default_runtime_command() -> Vec<String> {
    vec!["python".to_string(), "-u".to_string(), "-c".to_string()]
}

fn default_name_collision_retries() -> u32 {
    3
}

fn default_retry_steps() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    10
}

fn default_retry_factor() -> f64 {
    1.0
}

fn default_retry_jitter() -> f64 {
    0.1
}
