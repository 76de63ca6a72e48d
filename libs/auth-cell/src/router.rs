// libs/auth-cell/src/router.rs
use axum::{routing::get, Router};

use shared_utils::AppState;

use crate::handlers;

pub fn auth_routes(state: AppState) -> Router {
    // Both endpoints read the bearer token themselves
    let public_routes = Router::new()
        .route("/validate", get(handlers::validate_token).post(handlers::validate_token))
        .route("/verify", get(handlers::verify_token).post(handlers::verify_token));

    Router::new()
        .merge(public_routes)
        .with_state(state)
}
