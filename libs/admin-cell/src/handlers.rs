// libs/admin-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::provider::NewProvider;
use shared_utils::{AppState, Session};

use crate::services::AdminPanel;

fn open_panel(state: &AppState, token: &str, user: User) -> Result<AdminPanel, AppError> {
    let session = Session::authenticated(&state.config, token, user);
    Ok(AdminPanel::new(&session, state.clone())?)
}

// ==============================================================================
// PROVIDER MANAGEMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_providers(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let panel = open_panel(&state, auth.token(), user)?;
    let providers = panel.list_providers().await?;

    Ok(Json(json!({
        "success": true,
        "providers": providers,
        "total": providers.len()
    })))
}

#[axum::debug_handler]
pub async fn add_provider(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<NewProvider>,
) -> Result<Json<Value>, AppError> {
    let panel = open_panel(&state, auth.token(), user)?;
    let provider = panel.add_provider(request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Provider added",
        "provider": provider
    })))
}

#[axum::debug_handler]
pub async fn toggle_availability(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let panel = open_panel(&state, auth.token(), user)?;
    let provider = panel.toggle_availability(provider_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Availability changed",
        "available": provider.available,
        "provider": provider
    })))
}

#[axum::debug_handler]
pub async fn delete_provider(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let panel = open_panel(&state, auth.token(), user)?;
    panel.delete_provider(provider_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Provider deleted"
    })))
}

// ==============================================================================
// APPOINTMENT MANAGEMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let panel = open_panel(&state, auth.token(), user)?;
    let appointments = panel.list_appointments().await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let panel = open_panel(&state, auth.token(), user)?;
    let appointment = panel.cancel_appointment(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled",
        "refund_id": appointment.refund_id,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let panel = open_panel(&state, auth.token(), user)?;
    let appointment = panel.complete_appointment(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment completed",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn expire_unpaid(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let panel = open_panel(&state, auth.token(), user)?;
    let expired = panel.expire_unpaid().await?;

    Ok(Json(json!({
        "success": true,
        "cancelled": expired.cancelled,
        "total": expired.total
    })))
}

#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let panel = open_panel(&state, auth.token(), user)?;
    let stats = panel.dashboard().await?;

    Ok(Json(json!({
        "success": true,
        "dashboard": stats
    })))
}
