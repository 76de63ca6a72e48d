// libs/provider-cell/src/router.rs
use axum::{routing::get, Router};

use shared_utils::AppState;

use crate::handlers;

pub fn provider_routes(state: AppState) -> Router {
    // Browsing providers and their slots needs no sign-in
    let public_routes = Router::new()
        .route("/", get(handlers::list_providers))
        .route("/slots", get(handlers::provider_slots))
        .route("/{provider_id}", get(handlers::get_provider));

    Router::new()
        .merge(public_routes)
        .with_state(state)
}
