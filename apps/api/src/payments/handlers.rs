use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::payments::gate::{confirm_and_record, ConfirmOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// Processor payment reference handed to the client after checkout.
    /// Only ever used to look up the processor's own record; the body
    /// carries no success claim the server would have to trust.
    pub reference: String,
}

/// POST /api/v1/payments/confirm
///
/// Idempotent: redelivered webhooks and confirmation polls for the same
/// reference all succeed, with exactly one recorded effect.
pub async fn handle_confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmOutcome>, AppError> {
    let reference = req.reference.trim();
    if reference.is_empty() {
        return Err(AppError::Validation(
            "payment reference must not be empty".to_string(),
        ));
    }

    let outcome = confirm_and_record(&state.db, state.payments.as_ref(), reference).await?;
    Ok(Json(outcome))
}
