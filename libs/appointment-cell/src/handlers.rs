// libs/appointment-cell/src/handlers.rs
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
use shared_utils::{AppState, Session};

use crate::models::BookAppointmentRequest;
use crate::services::BookingService;

// ==============================================================================
// APPOINTMENT BOOKING HANDLERS
// ==============================================================================

/// Books a slot for the caller. Several `provider_ids` make one grouped
/// appointment that is reserved with every provider or not at all.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let session = Session::authenticated(&state.config, auth.token(), user);
    let user = session.user()?;

    let booking_service = BookingService::new(&state);
    let appointment = booking_service.book(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment_id": appointment.id,
        "appointment": appointment,
        "message": "Appointment booked, complete payment to confirm it"
    })))
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointments = booking_service.list_for_patient(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service.get_for_user(&user, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "status": appointment.status()
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service.cancel(&user, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled",
        "appointment": appointment,
        "refund_id": appointment.refund_id
    })))
}
