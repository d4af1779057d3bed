//! batchwork
//!
//! Per-tenant batch job queue, rate-limited dispatcher for an external
//! generation service and the HTTP surface that reports on both.

use shadow_rs::shadow;
shadow!(build);

pub mod api;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod jobs;
pub mod logger;
pub mod notify;
pub mod server;
pub mod state;
pub mod store;

pub use state::AppState;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
