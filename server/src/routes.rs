//! Router configuration.

use crate::api::{availability, orders, webhooks};
use crate::health::{health_check, readiness_check};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Build the complete Axum router.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Payment webhooks (provider selector via query param or header)
        .route("/webhooks/payments", post(webhooks::receive_payment))
        // Orders
        .route("/orders", post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/proof", post(orders::attach_proof))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        // Availability (selection grid read side)
        .route(
            "/raffles/:id/availability",
            get(availability::get_availability),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .with_state(state)
}
