//! Configuration for faas-daemon

use faas_controller::ControllerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Reconcile loop configuration
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Work queue and worker pool configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Simulated execution platform
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Work queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of reconcile workers
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_reconciles: usize,

    /// Deadline for a single reconcile cycle
    #[serde(default = "default_reconcile_timeout")]
    pub reconcile_timeout_secs: u64,

    /// Interval at which every Function is enqueued again
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// First failure backoff
    #[serde(default = "default_base_backoff")]
    pub base_backoff_ms: u64,

    /// Failure backoff ceiling
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: default_max_concurrent(),
            reconcile_timeout_secs: default_reconcile_timeout(),
            resync_interval_secs: default_resync_interval(),
            base_backoff_ms: default_base_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl QueueConfig {
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs.max(1))
    }
}

/// Simulated platform configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Run the simulator at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Age at which a Pending unit starts Running
    #[serde(default = "default_start_delay")]
    pub start_delay_secs: u64,

    /// Age at which a Running unit finishes
    #[serde(default = "default_run_duration")]
    pub run_duration_secs: u64,

    /// Probability that a finishing unit fails
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_ms: default_tick_interval(),
            start_delay_secs: default_start_delay(),
            run_duration_secs: default_run_duration(),
            failure_rate: default_failure_rate(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_max_concurrent() -> usize {
    4
}

fn default_reconcile_timeout() -> u64 {
    60
}

fn default_resync_interval() -> u64 {
    300
}

fn default_base_backoff() -> u64 {
    5
}

fn default_max_backoff() -> u64 {
    1000
}

fn default_tick_interval() -> u64 {
    1000
}

fn default_start_delay() -> u64 {
    2
}

fn default_run_duration() -> u64 {
    10
}

fn default_failure_rate() -> f64 {
    0.1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from defaults, an optional file and `FAAS_*` env vars
    ///
    /// Nested keys use a double underscore, e.g. `FAAS_QUEUE__MAX_CONCURRENT_RECONCILES`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FAAS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
