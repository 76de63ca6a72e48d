use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Integrity error: {message}")]
    Integrity { message: String, count: usize },

    #[error("Payment error: {0}")]
    Payment(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Integrity { message, .. } => (StatusCode::CONFLICT, message),
            AppError::Payment(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::ExternalService(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        tracing::error!("Error: {}: {}", status, message);

        let body = match &self {
            AppError::Integrity { count, .. } => json!({
                "error": message,
                "active_appointments": count
            }),
            _ => json!({
                "error": message
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<crate::appointment::LifecycleError> for AppError {
    fn from(err: crate::appointment::LifecycleError) -> Self {
        AppError::Conflict(err.to_string())
    }
}

impl From<crate::intake::ValidationError> for AppError {
    fn from(err: crate::intake::ValidationError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<crate::intake::IntakeError> for AppError {
    fn from(err: crate::intake::IntakeError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
