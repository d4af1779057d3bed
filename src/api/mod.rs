//! HTTP status surface: job status, cancellation, queue and dispatcher
//! inspection, health checks and the OpenAPI document.

mod doc;
pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use doc::ApiDoc;
pub use routes::create_router;
