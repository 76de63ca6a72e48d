// libs/provider-cell/src/handlers.rs
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::SlotGridQuery;
use crate::services::{generate_slots, parse_provider_ids, ProviderService, SlotHorizon};

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let provider_service = ProviderService::new(&state);
    let providers = provider_service.list_providers().await?;

    Ok(Json(json!({
        "success": true,
        "providers": providers,
        "total": providers.len()
    })))
}

#[axum::debug_handler]
pub async fn get_provider(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let provider_service = ProviderService::new(&state);
    let provider = provider_service.get_provider(provider_id).await?;

    Ok(Json(json!({
        "success": true,
        "provider": provider
    })))
}

/// Slot grid for one or more providers. A slot is booked when any of them
/// holds it. Without explicit `months`/`start_hour` the horizon follows the
/// selection size.
#[axum::debug_handler]
pub async fn provider_slots(
    State(state): State<AppState>,
    Query(query): Query<SlotGridQuery>,
) -> Result<Json<Value>, AppError> {
    let provider_ids = parse_provider_ids(&query.ids)?;

    let default = SlotHorizon::for_selection(provider_ids.len());
    let horizon = SlotHorizon::new(
        query.months.unwrap_or(default.months),
        query.start_hour.unwrap_or(default.start_hour),
    );

    let provider_service = ProviderService::new(&state);
    let providers = provider_service.get_many(&provider_ids).await?;
    let total_fee: f64 = providers.iter().map(|p| p.fee).sum();
    let days = generate_slots(&providers, horizon, Utc::now().date_naive());

    Ok(Json(json!({
        "success": true,
        "provider_ids": provider_ids,
        "total_fee": total_fee,
        "horizon": horizon,
        "days": days
    })))
}
