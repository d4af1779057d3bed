//! HTTP request handlers for API endpoints.

pub mod dispatcher;
pub mod health;
pub mod jobs;
pub mod queue;
