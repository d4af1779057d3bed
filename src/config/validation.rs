//! Configuration validation logic
//!
//! Each section checks its own ranges; [`Settings::validate`] runs them all.

use crate::config::error::ConfigError;
use crate::config::settings::{
    DispatcherConfig, LaneConfig, LoggerSettings, QueueConfig, ServerConfig, Settings,
    StoreBackend, StoreConfig, WebhookConfig,
};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::validation(
                "server.host",
                "Host must not be empty.",
            ));
        }

        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535.",
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// The level may be a bare level or an `EnvFilter` directive list;
    /// only the bare form is checked against the known level names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.to_lowercase();
        if !level.contains('=') && !level.contains(',') && !VALID_LOG_LEVELS.contains(&level.as_str())
        {
            return Err(ConfigError::ValidationError {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        if !VALID_LOG_FORMATS.contains(&self.file.format.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.file.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        if self.file.enabled && self.file.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        Ok(())
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::validation(
                "queue.batch_size",
                "Batch size must be at least 1.",
            ));
        }

        if self.reason_log_capacity == 0 {
            return Err(ConfigError::validation(
                "queue.reason_log_capacity",
                "Reason log capacity must be at least 1.",
            ));
        }

        for (name, job_type) in &self.job_types {
            if name.trim().is_empty() {
                return Err(ConfigError::validation(
                    "queue.job_types",
                    "Job type names must not be empty.",
                ));
            }

            if job_type.batch_size == Some(0) {
                return Err(ConfigError::ValidationError {
                    field: format!("queue.job_types.{}.batch_size", name),
                    message: "Batch size must be at least 1.".to_string(),
                });
            }

            if job_type.max_attempts == 0 {
                return Err(ConfigError::ValidationError {
                    field: format!("queue.job_types.{}.max_attempts", name),
                    message: "Max attempts must be at least 1 (1 disables retry).".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl LaneConfig {
    fn validate(&self, lane: &str) -> Result<(), ConfigError> {
        let field = |name: &str| format!("dispatcher.{}.{}", lane, name);

        if self.concurrency == 0 {
            return Err(ConfigError::validation(
                field("concurrency"),
                "Concurrency must be at least 1.".to_string(),
            ));
        }
        if self.rate_per_interval == 0 {
            return Err(ConfigError::validation(
                field("rate_per_interval"),
                "Rate must allow at least one start per interval.".to_string(),
            ));
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::validation(
                field("interval_ms"),
                "Interval must be greater than 0 milliseconds.".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::validation(
                field("timeout_ms"),
                "Timeout must be greater than 0 milliseconds.".to_string(),
            ));
        }

        Ok(())
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.interactive.validate("interactive")?;
        self.normal.validate("normal")?;
        self.bulk.validate("bulk")
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.trim().is_empty() {
            return Err(ConfigError::validation(
                "store.key_prefix",
                "Key prefix must not be empty.",
            ));
        }

        if self.backend == StoreBackend::Redis {
            let url = &self.redis.url;
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                return Err(ConfigError::validation(
                    "store.redis.url",
                    "Redis URL must start with redis:// or rediss://.",
                ));
            }
            if self.redis.pool_size == 0 {
                return Err(ConfigError::validation(
                    "store.redis.pool_size",
                    "Pool size must be at least 1.",
                ));
            }
        }

        Ok(())
    }
}

impl WebhookConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }

        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ConfigError::validation(
                "notifier.webhook.url",
                "Webhook URL must start with http:// or https://.",
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "notifier.webhook.timeout_seconds",
                "Webhook timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logger.validate()?;
        self.queue.validate()?;
        self.dispatcher.validate()?;
        self.store.validate()?;
        self.notifier.webhook.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::JobTypeConfig;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_server_port_zero_rejected() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "server.port"));
    }

    #[test]
    fn test_logger_directive_level_accepted() {
        let settings = LoggerSettings {
            level: "info,batchwork=debug".to_string(),
            ..LoggerSettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_logger_unknown_level_rejected() {
        let settings = LoggerSettings {
            level: "verbose".to_string(),
            ..LoggerSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_queue_zero_batch_rejected() {
        let mut queue = QueueConfig::default();
        queue.batch_size = 0;
        assert!(queue.validate().is_err());
    }

    #[test]
    fn test_job_type_zero_attempts_rejected() {
        let mut queue = QueueConfig::default();
        queue.job_types.insert(
            "seo".to_string(),
            JobTypeConfig {
                batch_size: None,
                max_attempts: 0,
            },
        );

        let err = queue.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { ref field, .. } if field == "queue.job_types.seo.max_attempts")
        );
    }

    #[test]
    fn test_lane_zero_rate_rejected() {
        let mut config = DispatcherConfig::default();
        config.bulk.rate_per_interval = 0;

        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { ref field, .. } if field == "dispatcher.bulk.rate_per_interval")
        );
    }

    #[test]
    fn test_redis_store_requires_redis_url() {
        let mut store = StoreConfig {
            backend: StoreBackend::Redis,
            ..StoreConfig::default()
        };
        assert!(store.validate().is_ok());

        store.redis.url = "http://localhost".to_string();
        assert!(store.validate().is_err());
    }

    #[test]
    fn test_enabled_webhook_requires_url() {
        let mut webhook = WebhookConfig::default();
        assert!(webhook.validate().is_ok());

        webhook.enabled = true;
        assert!(webhook.validate().is_err());

        webhook.url = "https://hooks.example.com/jobs".to_string();
        assert!(webhook.validate().is_ok());
    }
}
