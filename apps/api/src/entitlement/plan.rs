//! Plan resolution — maps an identity to its effective plan tier. Pure
//! read: the tier column is fetched fresh on every call (no caching, no
//! monotonicity assumption), and mutation happens exclusively through the
//! payment gate's upgrade path.

use sqlx::PgPool;
use tracing::warn;

use crate::models::identity::{IdentityRow, PlanTier};

/// Effective tier for an identity. Unlinked fingerprints are always
/// `Anonymous`; linked ones resolve to the account's current tier.
pub async fn tier_for(pool: &PgPool, identity: &IdentityRow) -> Result<PlanTier, sqlx::Error> {
    let account_id = match identity.linked_account_id {
        Some(id) => id,
        None => return Ok(PlanTier::Anonymous),
    };

    let tier: Option<String> = sqlx::query_scalar("SELECT plan_tier FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_optional(pool)
        .await?;

    match tier.as_deref().map(PlanTier::parse) {
        Some(Some(tier)) => Ok(tier),
        Some(None) => {
            // An unrecognized tier string means a schema/deploy mismatch.
            // Treat as the most restrictive registered tier rather than
            // guessing upward.
            warn!(
                "Account {account_id} has unrecognized plan tier {:?}, treating as registered_free",
                tier
            );
            Ok(PlanTier::RegisteredFree)
        }
        None => {
            warn!("Identity {} linked to missing account {account_id}", identity.id);
            Ok(PlanTier::RegisteredFree)
        }
    }
}
