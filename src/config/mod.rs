//! Configuration management for batchwork
//!
//! Layered loading from TOML files and `BATCHWORK_*` environment variables:
//!
//! 1. `default.toml` - base configuration
//! 2. `{environment}.toml` - environment overlay selected by `BATCHWORK_APP_ENV`
//! 3. `local.toml` - uncommitted local overrides
//! 4. `BATCHWORK_*` environment variables

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{
    DispatcherConfig, JobTypeConfig, LaneConfig, NotifierConfig, QueueConfig, Settings,
    StoreBackend, StoreConfig, WebhookConfig,
};
