use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlement::evaluate::{evaluate, DecisionReason, EntitlementDecision};
use crate::entitlement::fingerprint;
use crate::entitlement::identity::{resolve_or_create, ResolvedIdentity};
use crate::entitlement::ledger::{count_for, record_action, RecordResult};
use crate::entitlement::plan::tier_for;
use crate::entitlement::policy::ActionType;
use crate::errors::AppError;
use crate::models::identity::PlanTier;
use crate::state::AppState;

/// Browser signal map plus optional authenticated account, as sent by the
/// resume-editor UI on every gated interaction. Presenting an account id
/// links the fingerprint on first sight (one-time).
#[derive(Debug, Deserialize)]
pub struct IdentityParams {
    #[serde(default)]
    pub signals: serde_json::Map<String, serde_json::Value>,
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    #[serde(flatten)]
    pub identity: IdentityParams,
    pub action: ActionType,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub identity_id: Uuid,
    pub tier: PlanTier,
    /// Set when the fingerprint was already linked to a different account;
    /// the first link wins and this call was evaluated against it.
    pub link_conflict: bool,
    pub decision: EntitlementDecision,
}

/// POST /api/v1/entitlements/check
///
/// Read path: resolves the identity, evaluates the action, mutates no
/// quota state. Safe for the UI to poll on every re-render.
pub async fn handle_check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    let (resolved, tier, decision) = evaluate_for(&state, &req.identity, req.action).await?;

    Ok(Json(CheckResponse {
        identity_id: resolved.record.id,
        tier,
        link_conflict: resolved.link_conflict,
        decision,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecordFreeRequest {
    #[serde(flatten)]
    pub identity: IdentityParams,
    pub action: ActionType,
}

#[derive(Debug, Serialize)]
pub struct RecordFreeResponse {
    pub usage_id: Uuid,
    pub action: ActionType,
    pub reason: DecisionReason,
}

/// POST /api/v1/entitlements/record
///
/// Called by the UI only after the gated action genuinely completed
/// (e.g. the PDF was actually produced). Re-evaluates before writing so a
/// client cannot log itself past its quota; paid actions never come
/// through here, they are recorded by the payment gate.
pub async fn handle_record_free(
    State(state): State<AppState>,
    Json(req): Json<RecordFreeRequest>,
) -> Result<Json<RecordFreeResponse>, AppError> {
    let (resolved, _tier, decision) = evaluate_for(&state, &req.identity, req.action).await?;

    if !decision.allowed {
        return Err(AppError::UnprocessableEntity(format!(
            "{} is not currently granted a free or unlimited path",
            req.action.as_str()
        )));
    }

    match record_action(&state.db, resolved.record.id, req.action, 0, None).await? {
        RecordResult::Recorded(row) => Ok(Json(RecordFreeResponse {
            usage_id: row.id,
            action: req.action,
            reason: decision.reason,
        })),
        // Unreachable without a payment reference, but keep the arm honest.
        RecordResult::Duplicate { .. } => Err(AppError::UnprocessableEntity(
            "duplicate recording".to_string(),
        )),
    }
}

/// Shared read path for both handlers: identity upsert (plus optional
/// one-time link), fresh tier read, consistent usage count, pure decision.
async fn evaluate_for(
    state: &AppState,
    identity: &IdentityParams,
    action: ActionType,
) -> Result<(ResolvedIdentity, PlanTier, EntitlementDecision), AppError> {
    let hash = fingerprint::resolve(&identity.signals);
    let resolved = resolve_or_create(&state.db, &hash, identity.account_id).await?;

    let tier = tier_for(&state.db, &resolved.record).await?;
    let used = count_for(&state.db, &resolved.record, action).await?;

    let decision = evaluate(
        tier,
        fingerprint::is_sentinel(&hash),
        used,
        state.policies.policy_for(action),
        &state.policies.currency,
    );

    Ok((resolved, tier, decision))
}
