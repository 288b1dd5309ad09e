#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The plan state an account (or unlinked fingerprint) resolves to.
/// `Lifetime` and `RegisteredSubscription` always evaluate as unlimited;
/// the other two tiers are subject to per-action free quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Anonymous,
    RegisteredFree,
    RegisteredSubscription,
    Lifetime,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Anonymous => "anonymous",
            PlanTier::RegisteredFree => "registered_free",
            PlanTier::RegisteredSubscription => "registered_subscription",
            PlanTier::Lifetime => "lifetime",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "anonymous" => Some(PlanTier::Anonymous),
            "registered_free" => Some(PlanTier::RegisteredFree),
            "registered_subscription" => Some(PlanTier::RegisteredSubscription),
            "lifetime" => Some(PlanTier::Lifetime),
            _ => None,
        }
    }

    /// True for tiers that bypass quota accounting entirely.
    pub fn is_unlimited(&self) -> bool {
        matches!(
            self,
            PlanTier::RegisteredSubscription | PlanTier::Lifetime
        )
    }
}

/// One row of the `identities` table: a fingerprint hash and its optional
/// one-time link to an account. Rows are created lazily on first contact
/// and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IdentityRow {
    pub id: Uuid,
    pub fingerprint_hash: String,
    pub linked_account_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub linked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub plan_tier: String,
    pub plan_since: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_roundtrip() {
        for tier in [
            PlanTier::Anonymous,
            PlanTier::RegisteredFree,
            PlanTier::RegisteredSubscription,
            PlanTier::Lifetime,
        ] {
            assert_eq!(PlanTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(PlanTier::parse("premium"), None);
    }

    #[test]
    fn test_unlimited_tiers() {
        assert!(PlanTier::Lifetime.is_unlimited());
        assert!(PlanTier::RegisteredSubscription.is_unlimited());
        assert!(!PlanTier::RegisteredFree.is_unlimited());
        assert!(!PlanTier::Anonymous.is_unlimited());
    }
}
