//! Payment gate — verifies a payment against the processor's
//! authoritative record and applies its effect exactly once: a usage
//! record for metered actions, a plan change for upgrades. The UI never
//! self-reports a paid action as done; this is the only paid write path.

use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entitlement::identity::{ensure_account, find_by_id};
use crate::entitlement::ledger::{record_action, RecordResult};
use crate::entitlement::policy::ActionType;
use crate::errors::AppError;
use crate::models::identity::PlanTier;
use crate::payments::{PaymentError, PaymentProvider, PaymentPurpose, PaymentRecord};

/// Successful gate outcomes. `AlreadyRecorded` means a prior delivery of
/// the same confirmation won the insert; callers treat it exactly like
/// `ActionRecorded`, which makes confirmation idempotent end-to-end.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmOutcome {
    ActionRecorded {
        usage_id: Uuid,
        action_type: ActionType,
        amount_cents: i64,
    },
    AlreadyRecorded {
        reference: String,
    },
    PlanUpgraded {
        account_id: Uuid,
        tier: PlanTier,
    },
}

/// Verifies the payment behind `reference` and records its effect.
/// Nothing is mutated until verification (fetch + metadata parse) has
/// succeeded; the recording steps are safe to retry after a timeout of
/// unknown outcome because they dedup on the payment reference.
pub async fn confirm_and_record(
    pool: &PgPool,
    provider: &dyn PaymentProvider,
    reference: &str,
) -> Result<ConfirmOutcome, AppError> {
    let payment = provider
        .fetch_payment(reference)
        .await
        .map_err(|e| match e {
            PaymentError::NotFound(reference) => AppError::PaymentNotFound(reference),
            other => AppError::PaymentUnverifiable(other.to_string()),
        })?;

    let amount = payment.amount;
    let purpose = verified_purpose(&payment, reference)?;

    match purpose {
        PaymentPurpose::PlanUpgrade { account_id, tier } => {
            ensure_account(pool, account_id).await?;

            // Conditional update: setting the tier the account already has
            // affects zero rows, so redelivered upgrade confirmations are
            // no-ops. Upgrades are not metered actions; no usage record.
            let updated = sqlx::query(
                "UPDATE accounts SET plan_tier = $2, plan_since = now()
                 WHERE id = $1 AND plan_tier <> $2",
            )
            .bind(account_id)
            .bind(tier.as_str())
            .execute(pool)
            .await?;

            if updated.rows_affected() == 1 {
                info!("Upgraded account {account_id} to {}", tier.as_str());
            } else {
                debug!(
                    "Account {account_id} already on {}, upgrade was a no-op",
                    tier.as_str()
                );
            }

            Ok(ConfirmOutcome::PlanUpgraded { account_id, tier })
        }
        PaymentPurpose::MeteredAction {
            identity_id,
            action,
        } => {
            // A payment for an identity this engine has never issued means
            // the metadata cannot be trusted; nothing is recorded.
            let identity = find_by_id(pool, identity_id).await?.ok_or_else(|| {
                AppError::PaymentUnverifiable(format!(
                    "payment {reference} references unknown identity {identity_id}"
                ))
            })?;

            // Anonymous payers are honored: registration gating applies to
            // the free tier, never to a verified payment.
            confirm_metered(pool, identity.id, action, amount, reference).await
        }
    }
}

/// The pure half of verification: a payment is acted on only when its
/// status is terminal success AND its metadata names who and what it pays
/// for. Anything else is a user-visible verification failure with no
/// state change.
fn verified_purpose(
    payment: &PaymentRecord,
    reference: &str,
) -> Result<PaymentPurpose, AppError> {
    if !payment.succeeded() {
        return Err(AppError::PaymentNotSucceeded {
            reference: reference.to_string(),
            status: payment.status.clone(),
        });
    }

    PaymentPurpose::from_metadata(&payment.metadata)
        .map_err(|e| AppError::PaymentUnverifiable(format!("metadata: {e}")))
}

async fn confirm_metered(
    pool: &PgPool,
    identity_id: Uuid,
    action: ActionType,
    amount_cents: i64,
    reference: &str,
) -> Result<ConfirmOutcome, AppError> {
    match record_action(pool, identity_id, action, amount_cents, Some(reference)).await? {
        RecordResult::Recorded(row) => Ok(ConfirmOutcome::ActionRecorded {
            usage_id: row.id,
            action_type: action,
            amount_cents: row.amount_cents,
        }),
        RecordResult::Duplicate {
            external_payment_ref,
        } => {
            debug!("Confirmation for {external_payment_ref} was already applied");
            Ok(ConfirmOutcome::AlreadyRecorded {
                reference: external_payment_ref,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn payment(status: &str, metadata: &[(&str, &str)]) -> PaymentRecord {
        PaymentRecord {
            id: "pi_test".to_string(),
            status: status.to_string(),
            amount: 499,
            currency: "eur".to_string(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_non_succeeded_payment_is_rejected() {
        let p = payment("processing", &[]);
        let err = verified_purpose(&p, "pi_test").unwrap_err();
        assert!(matches!(
            err,
            AppError::PaymentNotSucceeded { ref status, .. } if status == "processing"
        ));
    }

    #[test]
    fn test_succeeded_payment_with_bad_metadata_is_unverifiable() {
        let p = payment("succeeded", &[("purpose", "metered_action")]);
        let err = verified_purpose(&p, "pi_test").unwrap_err();
        assert!(matches!(err, AppError::PaymentUnverifiable(_)));
    }

    #[test]
    fn test_succeeded_metered_payment_verifies() {
        let identity = Uuid::new_v4();
        let p = payment(
            "succeeded",
            &[
                ("purpose", "metered_action"),
                ("identity_id", &identity.to_string()),
                ("action_type", "adapt_cv"),
            ],
        );
        let purpose = verified_purpose(&p, "pi_test").unwrap();
        assert_eq!(
            purpose,
            PaymentPurpose::MeteredAction {
                identity_id: identity,
                action: ActionType::AdaptCv,
            }
        );
    }

    #[test]
    fn test_succeeded_upgrade_payment_verifies() {
        let account = Uuid::new_v4();
        let p = payment(
            "succeeded",
            &[
                ("purpose", "plan_upgrade"),
                ("account_id", &account.to_string()),
                ("upgrade_tier", "registered_subscription"),
            ],
        );
        let purpose = verified_purpose(&p, "pi_test").unwrap();
        assert_eq!(
            purpose,
            PaymentPurpose::PlanUpgrade {
                account_id: account,
                tier: PlanTier::RegisteredSubscription,
            }
        );
    }
}
