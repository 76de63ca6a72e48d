// libs/admin-cell/src/router.rs
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_utils::extractor::{admin_middleware, auth_middleware};
use shared_utils::AppState;

use crate::handlers;

pub fn admin_routes(state: AppState) -> Router {
    // Layers run bottom up: authenticate first, then check the role
    let admin_only = Router::new()
        .route("/providers", get(handlers::list_providers).post(handlers::add_provider))
        .route("/providers/{provider_id}", delete(handlers::delete_provider))
        .route("/providers/{provider_id}/availability", post(handlers::toggle_availability))
        .route("/appointments", get(handlers::list_appointments))
        .route("/appointments/expire-unpaid", post(handlers::expire_unpaid))
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/appointments/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/dashboard", get(handlers::dashboard))
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(admin_only)
        .with_state(state)
}
