// libs/patient-cell/src/handlers.rs
use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::UpdateProfileRequest;
use crate::services::ProfileService;

#[axum::debug_handler]
pub async fn get_patient_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = ProfileService::new(&state);

    let profile = service.get_profile(&user).await?;

    Ok(Json(json!({
        "success": true,
        "complete": profile.is_some(),
        "profile": profile,
        "email": user.email
    })))
}

#[axum::debug_handler]
pub async fn update_patient_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ProfileService::new(&state);

    let profile = service.update_profile(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated",
        "profile": profile
    })))
}
