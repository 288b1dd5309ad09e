//! Action policy table — per-action free quotas, overage prices, and the
//! anonymous-payment flag. These values are product configuration, not
//! derived state; they are the only inputs to entitlement evaluation
//! besides the plan tier and the usage count.

use serde::{Deserialize, Serialize};

use crate::models::identity::PlanTier;

/// The gated operations the engine meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    DownloadSpanish,
    DownloadEnglish,
    Translate,
    GenerateEmail,
    GenerateCoverLetter,
    AdaptCv,
}

impl ActionType {
    pub const ALL: [ActionType; 6] = [
        ActionType::DownloadSpanish,
        ActionType::DownloadEnglish,
        ActionType::Translate,
        ActionType::GenerateEmail,
        ActionType::GenerateCoverLetter,
        ActionType::AdaptCv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::DownloadSpanish => "download_spanish",
            ActionType::DownloadEnglish => "download_english",
            ActionType::Translate => "translate",
            ActionType::GenerateEmail => "generate_email",
            ActionType::GenerateCoverLetter => "generate_cover_letter",
            ActionType::AdaptCv => "adapt_cv",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "download_spanish" => Some(ActionType::DownloadSpanish),
            "download_english" => Some(ActionType::DownloadEnglish),
            "translate" => Some(ActionType::Translate),
            "generate_email" => Some(ActionType::GenerateEmail),
            "generate_cover_letter" => Some(ActionType::GenerateCoverLetter),
            "adapt_cv" => Some(ActionType::AdaptCv),
            _ => None,
        }
    }
}

/// Quotas and pricing for a single action type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActionPolicy {
    pub free_quota_anonymous: i64,
    pub free_quota_registered: i64,
    /// Per-unit overage price once the free quota is exhausted.
    pub unit_price_cents: i64,
    /// When true, anonymous identities must register before the paid path
    /// is offered. Payment verified by the gate always supersedes this.
    pub registration_required_to_pay: bool,
}

impl ActionPolicy {
    /// Free quota under a metered tier. Unlimited tiers never reach this;
    /// the `"anonymous"` sentinel fingerprint gets no free quota at all.
    pub fn free_quota_for(&self, tier: PlanTier, is_sentinel: bool) -> i64 {
        match tier {
            PlanTier::Anonymous if is_sentinel => 0,
            PlanTier::Anonymous => self.free_quota_anonymous,
            PlanTier::RegisteredFree => self.free_quota_registered,
            // Unlimited tiers are short-circuited by the evaluator.
            PlanTier::RegisteredSubscription | PlanTier::Lifetime => i64::MAX,
        }
    }
}

/// The full per-action configuration, held in `AppState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyTable {
    pub currency: String,
    download_spanish: ActionPolicy,
    download_english: ActionPolicy,
    translate: ActionPolicy,
    generate_email: ActionPolicy,
    generate_cover_letter: ActionPolicy,
    adapt_cv: ActionPolicy,
}

impl PolicyTable {
    /// Product defaults: downloads are payable anonymously; translation and
    /// CV adaptation require an account before the paid path is offered;
    /// email/cover-letter generation have no anonymous free quota but allow
    /// anonymous payment.
    pub fn with_currency(currency: String) -> Self {
        Self {
            currency,
            download_spanish: ActionPolicy {
                free_quota_anonymous: 1,
                free_quota_registered: 3,
                unit_price_cents: 299,
                registration_required_to_pay: false,
            },
            download_english: ActionPolicy {
                free_quota_anonymous: 0,
                free_quota_registered: 1,
                unit_price_cents: 299,
                registration_required_to_pay: false,
            },
            translate: ActionPolicy {
                free_quota_anonymous: 0,
                free_quota_registered: 1,
                unit_price_cents: 499,
                registration_required_to_pay: true,
            },
            generate_email: ActionPolicy {
                free_quota_anonymous: 0,
                free_quota_registered: 2,
                unit_price_cents: 199,
                registration_required_to_pay: false,
            },
            generate_cover_letter: ActionPolicy {
                free_quota_anonymous: 0,
                free_quota_registered: 2,
                unit_price_cents: 199,
                registration_required_to_pay: false,
            },
            adapt_cv: ActionPolicy {
                free_quota_anonymous: 0,
                free_quota_registered: 1,
                unit_price_cents: 599,
                registration_required_to_pay: true,
            },
        }
    }

    pub fn policy_for(&self, action: ActionType) -> &ActionPolicy {
        match action {
            ActionType::DownloadSpanish => &self.download_spanish,
            ActionType::DownloadEnglish => &self.download_english,
            ActionType::Translate => &self.translate,
            ActionType::GenerateEmail => &self.generate_email,
            ActionType::GenerateCoverLetter => &self.generate_cover_letter,
            ActionType::AdaptCv => &self.adapt_cv,
        }
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::with_currency("eur".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_roundtrip() {
        for action in ActionType::ALL {
            assert_eq!(ActionType::parse(action.as_str()), Some(action));
        }
        assert_eq!(ActionType::parse("download_french"), None);
    }

    #[test]
    fn test_every_action_has_positive_price() {
        let table = PolicyTable::default();
        for action in ActionType::ALL {
            assert!(table.policy_for(action).unit_price_cents > 0);
        }
    }

    #[test]
    fn test_registered_quota_never_below_anonymous() {
        let table = PolicyTable::default();
        for action in ActionType::ALL {
            let p = table.policy_for(action);
            assert!(p.free_quota_registered >= p.free_quota_anonymous);
        }
    }

    #[test]
    fn test_sentinel_has_no_free_quota() {
        let table = PolicyTable::default();
        let p = table.policy_for(ActionType::DownloadSpanish);
        assert_eq!(p.free_quota_for(PlanTier::Anonymous, true), 0);
        assert_eq!(p.free_quota_for(PlanTier::Anonymous, false), 1);
    }

    #[test]
    fn test_ai_actions_gate_anonymous_payment() {
        let table = PolicyTable::default();
        assert!(table.policy_for(ActionType::Translate).registration_required_to_pay);
        assert!(table.policy_for(ActionType::AdaptCv).registration_required_to_pay);
        assert!(!table.policy_for(ActionType::DownloadSpanish).registration_required_to_pay);
    }
}
