//! Usage ledger and action recorder — the single write path for completed
//! gated actions and the source of truth for "how many times has this
//! identity done X". The ledger is append-only; counts are derived on
//! read instead of maintained as mutable counters, which removes the
//! lost-update race entirely.

use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entitlement::policy::ActionType;
use crate::models::identity::IdentityRow;
use crate::models::usage::UsageRecordRow;

/// Outcome of `record_action`. `Duplicate` is returned when the payment
/// reference was already recorded; the payment gate treats it as success
/// (the action was recorded by a prior delivery of the same confirmation).
#[derive(Debug)]
pub enum RecordResult {
    Recorded(UsageRecordRow),
    Duplicate { external_payment_ref: String },
}

/// Appends one usage record. Paid recordings carry the processor
/// reference and are deduplicated on it via the unique index, so webhook
/// redelivery, confirmation polling, and double-click submission all
/// collapse onto a single row. Free recordings (no reference) are plain
/// appends; callers invoke them once per genuinely completed action.
pub async fn record_action(
    pool: &PgPool,
    identity_id: Uuid,
    action: ActionType,
    amount_cents: i64,
    external_payment_ref: Option<&str>,
) -> Result<RecordResult, sqlx::Error> {
    match external_payment_ref {
        Some(reference) => {
            let row: Option<UsageRecordRow> = sqlx::query_as(
                "INSERT INTO usage_records
                     (id, identity_id, action_type, amount_cents, external_payment_ref)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (external_payment_ref) DO NOTHING
                 RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(identity_id)
            .bind(action.as_str())
            .bind(amount_cents)
            .bind(reference)
            .fetch_optional(pool)
            .await?;

            match row {
                Some(row) => {
                    info!(
                        "Recorded paid {} for identity {identity_id} (ref {reference})",
                        action.as_str()
                    );
                    Ok(RecordResult::Recorded(row))
                }
                None => {
                    debug!("Payment reference {reference} already recorded, skipping");
                    Ok(RecordResult::Duplicate {
                        external_payment_ref: reference.to_string(),
                    })
                }
            }
        }
        None => {
            let row: UsageRecordRow = sqlx::query_as(
                "INSERT INTO usage_records (id, identity_id, action_type, amount_cents)
                 VALUES ($1, $2, $3, $4)
                 RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(identity_id)
            .bind(action.as_str())
            .bind(amount_cents)
            .fetch_one(pool)
            .await?;

            info!(
                "Recorded free {} for identity {identity_id}",
                action.as_str()
            );
            Ok(RecordResult::Recorded(row))
        }
    }
}

/// Usage count for an identity and action type, from a single consistent
/// read. For a linked identity the count spans every fingerprint linked
/// to the same account, so usage from before registration stays counted
/// after linking.
pub async fn count_for(
    pool: &PgPool,
    identity: &IdentityRow,
    action: ActionType,
) -> Result<i64, sqlx::Error> {
    let count: i64 = match identity.linked_account_id {
        Some(account_id) => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM usage_records u
                 JOIN identities i ON u.identity_id = i.id
                 WHERE i.linked_account_id = $1 AND u.action_type = $2",
            )
            .bind(account_id)
            .bind(action.as_str())
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM usage_records
                 WHERE identity_id = $1 AND action_type = $2",
            )
            .bind(identity.id)
            .bind(action.as_str())
            .fetch_one(pool)
            .await?
        }
    };

    Ok(count)
}
