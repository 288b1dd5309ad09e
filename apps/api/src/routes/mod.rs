pub mod health;

use axum::{routing::get, routing::post, Router};

use crate::entitlement::handlers as entitlements;
use crate::payments::handlers as payments;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Entitlement API — read path + free-action recording
        .route(
            "/api/v1/entitlements/check",
            post(entitlements::handle_check),
        )
        .route(
            "/api/v1/entitlements/record",
            post(entitlements::handle_record_free),
        )
        // Payment gate — server-side verification, the only paid write path
        .route("/api/v1/payments/confirm", post(payments::handle_confirm))
        .with_state(state)
}
