//! Data Transfer Objects for API requests and responses.
//!
//! DTOs are organized by domain:
//! - `job` - cancellation and dispatcher control DTOs
//! - `health` - health check DTOs
//! - `error` - Common error response DTOs

mod error;
mod health;
mod job;

pub use error::ErrorResponse;
pub use health::{ComponentHealth, HealthResponse, HealthStatus};
pub use job::{CancellationRequest, CancellationResponse, ClearResponse};
