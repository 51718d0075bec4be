use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Authentication error: {0}")]
    AuthError(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    /// Payment provider is temporarily disabled by configuration. Clients
    /// render a maintenance banner instead of a generic failure.
    #[error("Payment gateway under maintenance")]
    MaintenanceMode,

    /// Provider did not answer within the configured deadline.
    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(rename = "maintenanceMode", skip_serializing_if = "Option::is_none")]
    maintenance_mode: Option<bool>,
    #[serde(rename = "errorCategory", skip_serializing_if = "Option::is_none")]
    error_category: Option<String>,
}

impl ErrorResponse {
    fn new(error: String, details: Option<String>) -> Self {
        Self {
            error,
            details,
            maintenance_mode: None,
            error_category: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new("Validation error".to_string(), Some(err.to_string())),
            ),
            AppError::BadRequest(err) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(err.to_string(), None),
            ),
            AppError::NotFound(err) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(err.to_string(), None),
            ),
            AppError::Unauthorized(err) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new(err.to_string(), None),
            ),
            AppError::Forbidden(err) => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new(err.to_string(), None),
            ),
            AppError::AuthError(err) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new(err.to_string(), None),
            ),
            AppError::Conflict(err) => (
                StatusCode::CONFLICT,
                ErrorResponse::new(err.to_string(), None),
            ),
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("An unexpected error occurred".to_string(), None),
                )
            }
            AppError::MaintenanceMode => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: "Payment gateway is under maintenance. Please try again later."
                        .to_string(),
                    details: None,
                    maintenance_mode: Some(true),
                    error_category: None,
                },
            ),
            AppError::GatewayTimeout(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorResponse {
                    error: msg,
                    details: None,
                    maintenance_mode: None,
                    error_category: Some("gateway_timeout".to_string()),
                },
            ),
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("Service unavailable".to_string(), None),
            ),
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Database error".to_string(), None),
                )
            }
            AppError::RedisError(err) => {
                tracing::error!(error = %err, "Cache error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Cache error".to_string(), None),
                )
            }
            AppError::InvalidToken(err) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("Invalid token".to_string(), Some(err.to_string())),
            ),
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Configuration error".to_string(), Some(err.to_string())),
            ),
        };

        (status, Json(body)).into_response()
    }
}
