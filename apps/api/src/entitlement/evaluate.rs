//! Entitlement evaluation — the pure decision function at the core of the
//! engine: (plan tier, action policy, usage-to-date) → decision. No side
//! effects, no hidden inputs, safe to call repeatedly for UI polling; the
//! HTTP handler wires store reads into it.

use serde::{Deserialize, Serialize};

use crate::entitlement::policy::ActionPolicy;
use crate::models::identity::PlanTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Free,
    Unlimited,
    Paid,
    NeedsRegistration,
}

/// Computed on demand, never persisted. Denials always carry one of the
/// two resolutions the UI can present: a price, or register-to-continue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
    /// Remaining free uses under the current tier; `None` means unbounded.
    pub remaining_free: Option<i64>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
}

/// Decides whether one identity may perform one action type right now.
/// Deterministic given the same inputs.
pub fn evaluate(
    tier: PlanTier,
    is_sentinel: bool,
    used: i64,
    policy: &ActionPolicy,
    currency: &str,
) -> EntitlementDecision {
    if tier.is_unlimited() {
        return EntitlementDecision {
            allowed: true,
            reason: DecisionReason::Unlimited,
            remaining_free: None,
            price_cents: None,
            currency: None,
        };
    }

    let free_limit = policy.free_quota_for(tier, is_sentinel);
    if used < free_limit {
        return EntitlementDecision {
            allowed: true,
            reason: DecisionReason::Free,
            remaining_free: Some(free_limit - used),
            price_cents: None,
            currency: None,
        };
    }

    // Quota exhausted. Registration gating applies only to the free-tier
    // path offered here; a verified payment at the gate supersedes it.
    if policy.registration_required_to_pay && tier == PlanTier::Anonymous {
        return EntitlementDecision {
            allowed: false,
            reason: DecisionReason::NeedsRegistration,
            remaining_free: Some(0),
            price_cents: None,
            currency: None,
        };
    }

    EntitlementDecision {
        allowed: false,
        reason: DecisionReason::Paid,
        remaining_free: Some(0),
        price_cents: Some(policy.unit_price_cents),
        currency: Some(currency.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(anon: i64, registered: i64, price: i64, gated: bool) -> ActionPolicy {
        ActionPolicy {
            free_quota_anonymous: anon,
            free_quota_registered: registered,
            unit_price_cents: price,
            registration_required_to_pay: gated,
        }
    }

    #[test]
    fn test_lifetime_is_unlimited_regardless_of_usage() {
        let p = policy(0, 0, 499, true);
        let decision = evaluate(PlanTier::Lifetime, false, 1000, &p, "eur");
        assert!(decision.allowed);
        assert_eq!(decision.reason, DecisionReason::Unlimited);
        assert_eq!(decision.remaining_free, None);
        assert_eq!(decision.price_cents, None);
    }

    #[test]
    fn test_subscription_is_unlimited() {
        let p = policy(1, 3, 299, false);
        let decision = evaluate(PlanTier::RegisteredSubscription, false, 50, &p, "eur");
        assert!(decision.allowed);
        assert_eq!(decision.reason, DecisionReason::Unlimited);
    }

    #[test]
    fn test_quota_boundary_counts_down_then_prices() {
        let p = policy(3, 3, 299, false);
        for (used, remaining) in [(0, 3), (1, 2), (2, 1)] {
            let decision = evaluate(PlanTier::Anonymous, false, used, &p, "eur");
            assert!(decision.allowed, "use {used} should be free");
            assert_eq!(decision.reason, DecisionReason::Free);
            assert_eq!(decision.remaining_free, Some(remaining));
        }
        let fourth = evaluate(PlanTier::Anonymous, false, 3, &p, "eur");
        assert!(!fourth.allowed);
        assert_eq!(fourth.reason, DecisionReason::Paid);
        assert_eq!(fourth.remaining_free, Some(0));
        assert_eq!(fourth.price_cents, Some(299));
        assert_eq!(fourth.currency.as_deref(), Some("eur"));
    }

    #[test]
    fn test_anonymous_gated_action_requires_registration() {
        let p = policy(0, 1, 499, true);
        let decision = evaluate(PlanTier::Anonymous, false, 0, &p, "eur");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::NeedsRegistration);
        assert_eq!(decision.price_cents, None);
    }

    #[test]
    fn test_registered_user_on_gated_action_gets_priced_offer() {
        let p = policy(0, 1, 499, true);
        let decision = evaluate(PlanTier::RegisteredFree, false, 1, &p, "eur");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::Paid);
        assert_eq!(decision.price_cents, Some(499));
    }

    #[test]
    fn test_sentinel_fingerprint_gets_no_free_quota() {
        let p = policy(2, 3, 299, false);
        let decision = evaluate(PlanTier::Anonymous, true, 0, &p, "eur");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::Paid);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let p = policy(1, 3, 299, false);
        let first = evaluate(PlanTier::RegisteredFree, false, 2, &p, "eur");
        for _ in 0..10 {
            let again = evaluate(PlanTier::RegisteredFree, false, 2, &p, "eur");
            assert_eq!(again.allowed, first.allowed);
            assert_eq!(again.reason, first.reason);
            assert_eq!(again.remaining_free, first.remaining_free);
        }
    }

    #[test]
    fn test_zero_quota_action_goes_straight_to_paid() {
        let p = policy(0, 0, 199, false);
        let decision = evaluate(PlanTier::RegisteredFree, false, 0, &p, "usd");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::Paid);
        assert_eq!(decision.currency.as_deref(), Some("usd"));
    }
}
