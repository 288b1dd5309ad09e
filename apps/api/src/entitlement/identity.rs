//! Identity store — durable mapping from a fingerprint hash to an optional
//! linked account. Creation and linking both go through single-statement
//! SQL primitives so that concurrent requests for the same fingerprint
//! cannot create two rows or both win a link race.

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::identity::IdentityRow;

/// Result of `resolve_or_create`. `link_conflict` is the non-fatal
/// diagnostic for a fingerprint already linked to a different account:
/// the first link wins and the caller sees the existing record.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub record: IdentityRow,
    pub link_conflict: bool,
}

/// Idempotent upsert for a fingerprint, optionally linking it to an
/// account. Linking is one-time per fingerprint: an unlinked row is linked
/// to the supplied account, a row already linked elsewhere is left alone.
pub async fn resolve_or_create(
    pool: &PgPool,
    fingerprint_hash: &str,
    account_id: Option<Uuid>,
) -> Result<ResolvedIdentity, sqlx::Error> {
    // Insert-if-absent, keyed on the hash. Duplicate init calls from the
    // same new device collapse onto one row here.
    let inserted = sqlx::query(
        "INSERT INTO identities (id, fingerprint_hash) VALUES ($1, $2)
         ON CONFLICT (fingerprint_hash) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(fingerprint_hash)
    .execute(pool)
    .await?;

    if inserted.rows_affected() == 1 {
        info!("Created identity for fingerprint {fingerprint_hash}");
    }

    if let Some(account) = account_id {
        ensure_account(pool, account).await?;

        // One-time link, first writer wins. The IS NULL guard makes this a
        // compare-and-set rather than a read-then-write.
        let linked = sqlx::query(
            "UPDATE identities
             SET linked_account_id = $2, linked_at = now()
             WHERE fingerprint_hash = $1 AND linked_account_id IS NULL",
        )
        .bind(fingerprint_hash)
        .bind(account)
        .execute(pool)
        .await?;

        if linked.rows_affected() == 1 {
            info!("Linked fingerprint {fingerprint_hash} to account {account}");
        }
    }

    let record: IdentityRow =
        sqlx::query_as("SELECT * FROM identities WHERE fingerprint_hash = $1")
            .bind(fingerprint_hash)
            .fetch_one(pool)
            .await?;

    let link_conflict = match (account_id, record.linked_account_id) {
        (Some(requested), Some(existing)) if requested != existing => {
            warn!(
                "Fingerprint {fingerprint_hash} already linked to account {existing}, \
                 refusing re-link to {requested}"
            );
            true
        }
        _ => false,
    };

    Ok(ResolvedIdentity {
        record,
        link_conflict,
    })
}

/// Lazily creates the account row the first time the engine sees an
/// account id (registration itself lives in the auth collaborator). New
/// accounts start on the registered-free tier.
pub async fn ensure_account(pool: &PgPool, account_id: Uuid) -> Result<(), sqlx::Error> {
    let inserted = sqlx::query(
        "INSERT INTO accounts (id, plan_tier, plan_since) VALUES ($1, 'registered_free', now())
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(account_id)
    .execute(pool)
    .await?;

    if inserted.rows_affected() == 1 {
        info!("Created account {account_id} on registered_free tier");
    }
    Ok(())
}

/// Looks up an identity row by its id (used by the payment gate, which
/// receives the identity reference from processor metadata).
pub async fn find_by_id(
    pool: &PgPool,
    identity_id: Uuid,
) -> Result<Option<IdentityRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM identities WHERE id = $1")
        .bind(identity_id)
        .fetch_optional(pool)
        .await
}
