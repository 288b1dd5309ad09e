//! Entitlement & usage-metering engine: decides, for every gated action,
//! whether an identity may perform it free, must pay per use, or has
//! unlimited access — and durably records usage so the decision stays
//! consistent across retries, anonymous-to-authenticated transitions, and
//! concurrent requests.

pub mod evaluate;
pub mod fingerprint;
pub mod handlers;
pub mod identity;
pub mod ledger;
pub mod plan;
pub mod policy;
