//! Error handler for converting AppError to HTTP responses.
//!
//! Internal causes are logged here and never copied into the body.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::api::dto::ErrorResponse;
use crate::error::AppError;

impl IntoResponse for AppError {
    /// # Status Code Mapping
    /// - Validation → 400 BAD_REQUEST
    /// - BadRequest → 400 BAD_REQUEST
    /// - Unavailable → 503 SERVICE_UNAVAILABLE
    /// - Store → 503 SERVICE_UNAVAILABLE
    /// - Configuration → 500 INTERNAL_SERVER_ERROR
    /// - Internal → 500 INTERNAL_SERVER_ERROR
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation { field, reason } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::validation_error(field, reason),
            ),
            AppError::BadRequest { message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("BAD_REQUEST", message),
            ),
            AppError::Unavailable { message } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("SERVICE_UNAVAILABLE", message),
            ),
            AppError::Store { operation, source } => {
                tracing::error!(error = %source, operation = %operation, "Status store failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("STORE_UNAVAILABLE", "Status store unavailable")
                        .with_details(json!({ "operation": operation })),
                )
            }
            AppError::Configuration { key, source } => {
                tracing::error!(error = %source, key = %key, "Configuration failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("CONFIGURATION_ERROR", &format!("Configuration error: {}", key)),
                )
            }
            AppError::Internal { source } => {
                tracing::error!(error = ?source, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred"),
                )
            }
        };

        let mut response = (status, Json(body.clone())).into_response();
        // Picked up by the request-id middleware to stamp the body
        response.extensions_mut().insert(body);
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match &rejection {
            JsonRejection::JsonDataError(_) => "Invalid JSON format".to_string(),
            JsonRejection::JsonSyntaxError(_) => "JSON syntax error".to_string(),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing or invalid Content-Type header, expected application/json".to_string()
            }
            _ => format!("Failed to parse JSON request: {}", rejection.body_text()),
        };
        AppError::BadRequest { message }
    }
}
