//! Configuration settings structures for batchwork
//!
//! Every section deserializes from TOML and `BATCHWORK_*` environment
//! variables; missing keys fall back to the `default_*` functions below.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "batchwork".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/batchwork.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_batch_size() -> usize {
    2
}

fn default_inter_batch_delay_ms() -> u64 {
    300
}

fn default_reason_log_capacity() -> usize {
    10
}

fn default_notify_threshold_secs() -> u64 {
    120
}

fn default_item_estimate_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    1
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_interactive_lane() -> LaneConfig {
    LaneConfig {
        concurrency: 3,
        rate_per_interval: 10,
        interval_ms: default_interval_ms(),
        timeout_ms: 30_000,
    }
}

fn default_normal_lane() -> LaneConfig {
    LaneConfig {
        concurrency: 2,
        rate_per_interval: 8,
        interval_ms: default_interval_ms(),
        timeout_ms: 30_000,
    }
}

fn default_bulk_lane() -> LaneConfig {
    LaneConfig {
        concurrency: 1,
        rate_per_interval: 5,
        interval_ms: default_interval_ms(),
        timeout_ms: 60_000,
    }
}

fn default_key_prefix() -> String {
    "batchwork".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_pool_size() -> u32 {
    10
}

fn default_redis_connection_timeout() -> u64 {
    5
}

fn default_snapshot_ttl() -> u64 {
    7 * 24 * 60 * 60 // one week
}

fn default_webhook_timeout() -> u64 {
    10
}

// ============================================================================
// Application Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP status surface configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound in seconds on waiting for the active job during shutdown
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    /// Get the full server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level or full `EnvFilter` directive, e.g. "info,batchwork=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime [`LoggerConfig`].
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let format = self
            .file
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.file.format", e.to_string()))?;

        let config = LoggerConfig {
            level: self.level,
            console: ConsoleConfig {
                enabled: self.console.enabled,
                colored: self.console.colored,
            },
            file: FileConfig {
                enabled: self.file.enabled,
                path: PathBuf::from(self.file.path),
                append: self.file.append,
                format,
            },
        };

        config
            .validate()
            .map_err(|e| ConfigError::validation("logger", e.to_string()))?;
        Ok(config)
    }
}

// ============================================================================
// Queue Configuration
// ============================================================================

/// Per job type overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTypeConfig {
    /// Items per parallel batch; falls back to `queue.batch_size`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Total attempts for failed items. 1 disables retry-with-requeue.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for JobTypeConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            max_attempts: default_max_attempts(),
        }
    }
}

/// Batch engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between consecutive batches of one job
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,

    /// Newest skip/fail reasons kept per job
    #[serde(default = "default_reason_log_capacity")]
    pub reason_log_capacity: usize,

    /// Completed jobs running longer than this trigger the completion notifier
    #[serde(default = "default_notify_threshold_secs")]
    pub notify_threshold_secs: u64,

    /// Per-item guess used for the remaining-time estimate before any item finishes
    #[serde(default = "default_item_estimate_secs")]
    pub default_item_estimate_secs: u64,

    #[serde(default)]
    pub job_types: BTreeMap<String, JobTypeConfig>,
}

impl QueueConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn notify_threshold(&self) -> Duration {
        Duration::from_secs(self.notify_threshold_secs)
    }

    /// Batch size for `job_type`, honoring its override.
    pub fn batch_size_for(&self, job_type: &str) -> usize {
        self.job_types
            .get(job_type)
            .and_then(|t| t.batch_size)
            .unwrap_or(self.batch_size)
            .max(1)
    }

    /// Attempt budget for `job_type`; at least 1.
    pub fn max_attempts_for(&self, job_type: &str) -> u32 {
        self.job_types
            .get(job_type)
            .map(|t| t.max_attempts)
            .unwrap_or_else(default_max_attempts)
            .max(1)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            reason_log_capacity: default_reason_log_capacity(),
            notify_threshold_secs: default_notify_threshold_secs(),
            default_item_estimate_secs: default_item_estimate_secs(),
            job_types: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Dispatcher Configuration
// ============================================================================

/// Limits for one dispatcher lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneConfig {
    /// Tasks allowed to run at once
    pub concurrency: usize,
    /// Task starts allowed per `interval_ms`
    pub rate_per_interval: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Deadline for a single task, measured from its start
    pub timeout_ms: u64,
}

impl LaneConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_interactive_lane")]
    pub interactive: LaneConfig,

    #[serde(default = "default_normal_lane")]
    pub normal: LaneConfig,

    #[serde(default = "default_bulk_lane")]
    pub bulk: LaneConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            interactive: default_interactive_lane(),
            normal: default_normal_lane(),
            bulk: default_bulk_lane(),
        }
    }
}

// ============================================================================
// Status Store Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisStoreConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,

    /// Pool checkout timeout in seconds
    #[serde(default = "default_redis_connection_timeout")]
    pub connection_timeout: u64,

    /// Expiry for snapshot and cancellation entries in seconds; 0 keeps them forever
    #[serde(default = "default_snapshot_ttl")]
    pub ttl_seconds: u64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            connection_timeout: default_redis_connection_timeout(),
            ttl_seconds: default_snapshot_ttl(),
        }
    }
}

/// Job status store configuration
///
/// ```toml
/// [store]
/// backend = "redis"
/// key_prefix = "batchwork"
///
/// [store.redis]
/// url = "redis://127.0.0.1:6379"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default)]
    pub redis: RedisStoreConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            key_prefix: default_key_prefix(),
            redis: RedisStoreConfig::default(),
        }
    }
}

// ============================================================================
// Notifier Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub url: String,

    #[serde(default = "default_webhook_timeout")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            timeout_seconds: default_webhook_timeout(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook: WebhookConfig,
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,
}
