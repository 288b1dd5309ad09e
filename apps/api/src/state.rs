use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::entitlement::policy::PolicyTable;
use crate::payments::PaymentProvider;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Payment processor seam. Stripe in production; tests substitute a
    /// canned provider without touching handlers or the gate.
    pub payments: Arc<dyn PaymentProvider>,
    /// Per-action quotas, prices, and registration gating.
    pub policies: Arc<PolicyTable>,
    pub config: Config,
}
