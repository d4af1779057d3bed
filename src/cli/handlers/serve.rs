//! Serve command handler
//!
//! The real startup lives in `main.rs`; this handler only owns the dry run.

use crate::config::{Settings, StoreBackend};
use crate::dispatcher::Lane;
use crate::error::AppResult;

pub struct ServeCommandHandler {
    config: Settings,
}

impl ServeCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(&self, dry_run: bool) -> AppResult<()> {
        if dry_run {
            self.validate_only().await
        } else {
            Ok(())
        }
    }

    /// Validates the configuration and prints what the server would run with.
    pub async fn validate_only(&self) -> AppResult<()> {
        self.config.validate()?;

        println!("✓ Configuration is valid");
        for line in self.summary() {
            println!("✓ {}", line);
        }
        println!("Dry run completed successfully - configuration is ready for deployment");
        Ok(())
    }

    fn summary(&self) -> Vec<String> {
        let config = &self.config;
        let mut lines = vec![format!("Server would bind to: {}", config.server.address())];

        lines.push(format!(
            "Queue: batch size {}, {}ms between batches, notify after {}s",
            config.queue.batch_size,
            config.queue.inter_batch_delay_ms,
            config.queue.notify_threshold_secs
        ));
        for (name, job_type) in &config.queue.job_types {
            lines.push(format!(
                "Job type {}: batch size {}, {} attempt(s)",
                name,
                job_type.batch_size.unwrap_or(config.queue.batch_size),
                job_type.max_attempts
            ));
        }

        for lane in Lane::ALL {
            let lane_config = match lane {
                Lane::Interactive => &config.dispatcher.interactive,
                Lane::Normal => &config.dispatcher.normal,
                Lane::Bulk => &config.dispatcher.bulk,
            };
            lines.push(format!(
                "Dispatcher {} lane: {} concurrent, {} per {}ms, timeout {}ms",
                lane,
                lane_config.concurrency,
                lane_config.rate_per_interval,
                lane_config.interval_ms,
                lane_config.timeout_ms
            ));
        }

        lines.push(match config.store.backend {
            StoreBackend::Memory => "Status store: in-memory".to_string(),
            StoreBackend::Redis => format!(
                "Status store: redis (pool {}, ttl {}s)",
                config.store.redis.pool_size, config.store.redis.ttl_seconds
            ),
        });

        lines.push(if config.notifier.webhook.enabled {
            format!("Completion webhook: {}", config.notifier.webhook.url)
        } else {
            "Completion webhook: disabled".to_string()
        });

        lines
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
