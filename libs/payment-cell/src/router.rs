// libs/payment-cell/src/router.rs
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn payment_routes(state: AppState) -> Router {
    // The provider calls this one; it carries a signature, not a bearer token
    let public_routes = Router::new()
        .route("/webhook", post(handlers::payment_webhook));

    let protected_routes = Router::new()
        .route("/sessions", post(handlers::create_checkout_session))
        .route("/verify", post(handlers::verify_payment))
        .route("/status/{appointment_id}", get(handlers::payment_status))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
