// libs/auth-cell/src/handlers.rs
use axum::{
    extract::{Json, State},
    http::HeaderMap,
};
use serde_json::json;
use tracing::debug;

use shared_models::auth::TokenResponse;
use shared_models::error::AppError;
use shared_utils::{AppState, Session};

// Helper function to extract token
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

/// Starts a session from the bearer token and describes the caller.
pub async fn validate_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;

    let mut session = Session::new(&state.config);
    let user = session.init(&token)?;

    let response = TokenResponse {
        valid: true,
        user_id: user.id.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
    };
    session.teardown();

    Ok(Json(response))
}

/// Like [`validate_token`] but never fails on a bad token.
pub async fn verify_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;

    let mut session = Session::new(&state.config);
    let is_admin = match session.init(&token) {
        Ok(user) => Some(user.is_admin()),
        Err(_) => None,
    };

    Ok(Json(json!({
        "valid": is_admin.is_some(),
        "is_admin": is_admin.unwrap_or(false)
    })))
}
