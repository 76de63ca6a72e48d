// libs/payment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{CreateCheckoutRequest, VerifyPaymentRequest};
use crate::services::CheckoutService;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<Json<Value>, AppError> {
    let checkout_service = CheckoutService::new(&state);
    let session = checkout_service
        .create_session(&user, &request.appointment_ids)
        .await?;

    Ok(Json(json!({
        "success": true,
        "session_id": session.session_id,
        "session_url": session.url,
        "amount": session.amount,
        "currency": session.currency,
        "appointment_ids": session.appointment_ids
    })))
}

#[axum::debug_handler]
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let checkout_service = CheckoutService::new(&state);
    let confirmation = checkout_service
        .verify(&request.session_id, Some(&user.id))
        .await?;

    let message = if confirmation.paid {
        "Payment verified"
    } else {
        "Payment has not been completed"
    };

    Ok(Json(json!({
        "success": confirmation.paid,
        "message": message,
        "confirmation": confirmation
    })))
}

#[axum::debug_handler]
pub async fn payment_status(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let checkout_service = CheckoutService::new(&state);
    let status = checkout_service.payment_status(&user, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "payment": status
    })))
}

// ==============================================================================
// WEBHOOK (SIGNATURE AUTHENTICATED)
// ==============================================================================

#[axum::debug_handler]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing webhook signature".to_string()))?;

    let checkout_service = CheckoutService::new(&state);
    let confirmation = checkout_service.handle_webhook(&body, signature).await?;

    if let Some(confirmation) = &confirmation {
        info!(
            "Webhook confirmed session {} ({} newly paid)",
            confirmation.session_id, confirmation.newly_paid
        );
    }

    Ok(Json(json!({
        "received": true,
        "handled": confirmation.is_some()
    })))
}
