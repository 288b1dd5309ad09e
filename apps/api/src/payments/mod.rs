/// Payment processor client — the single point of entry for all processor
/// API calls in the engine.
///
/// ARCHITECTURAL RULE: the processor's server-side record is the sole
/// source of truth for "did payment succeed". No handler may trust a
/// client-supplied success claim; everything goes through this module.
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod gate;
pub mod handlers;

use crate::entitlement::policy::ActionType;
use crate::models::identity::PlanTier;

const STRIPE_API_VERSION: &str = "2023-10-16";
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Processor API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("No payment found for reference {0}")]
    NotFound(String),

    #[error("Processor unreachable after {retries} retries")]
    Unreachable { retries: u32 },
}

/// Terminal view of a processor-held payment. Only `status == Succeeded`
/// payments are ever acted on.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentRecord {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// What a verified payment pays for, recovered from processor metadata.
/// The `purpose` discriminator replaces ad hoc string comparison on
/// client-supplied fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentPurpose {
    MeteredAction {
        identity_id: Uuid,
        action: ActionType,
    },
    PlanUpgrade {
        account_id: Uuid,
        tier: PlanTier,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Missing metadata key '{0}'")]
    MissingKey(&'static str),

    #[error("Unknown purpose '{0}'")]
    UnknownPurpose(String),

    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: &'static str, value: String },
}

impl PaymentPurpose {
    /// Parses the required metadata keys: `purpose` discriminates metered
    /// actions from plan upgrades; the rest identify who and what.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self, MetadataError> {
        let purpose = metadata
            .get("purpose")
            .ok_or(MetadataError::MissingKey("purpose"))?;

        match purpose.as_str() {
            "metered_action" => {
                let identity_id = parse_uuid(metadata, "identity_id")?;
                let raw = metadata
                    .get("action_type")
                    .ok_or(MetadataError::MissingKey("action_type"))?;
                let action =
                    ActionType::parse(raw).ok_or_else(|| MetadataError::InvalidValue {
                        key: "action_type",
                        value: raw.clone(),
                    })?;
                Ok(PaymentPurpose::MeteredAction {
                    identity_id,
                    action,
                })
            }
            "plan_upgrade" => {
                let account_id = parse_uuid(metadata, "account_id")?;
                let raw = metadata
                    .get("upgrade_tier")
                    .ok_or(MetadataError::MissingKey("upgrade_tier"))?;
                let tier = PlanTier::parse(raw)
                    .filter(PlanTier::is_unlimited)
                    .ok_or_else(|| MetadataError::InvalidValue {
                        key: "upgrade_tier",
                        value: raw.clone(),
                    })?;
                Ok(PaymentPurpose::PlanUpgrade { account_id, tier })
            }
            other => Err(MetadataError::UnknownPurpose(other.to_string())),
        }
    }
}

fn parse_uuid(
    metadata: &HashMap<String, String>,
    key: &'static str,
) -> Result<Uuid, MetadataError> {
    let raw = metadata.get(key).ok_or(MetadataError::MissingKey(key))?;
    Uuid::parse_str(raw).map_err(|_| MetadataError::InvalidValue {
        key,
        value: raw.clone(),
    })
}

/// The seam the gate verifies payments through. Carried in `AppState` as
/// `Arc<dyn PaymentProvider>` so tests can substitute a canned processor.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn fetch_payment(&self, reference: &str) -> Result<PaymentRecord, PaymentError>;
}

#[derive(Debug, Deserialize)]
struct StripeError {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

/// Stripe-backed provider. Fetches payment intents by reference with
/// bearer auth, retrying on 429 and 5xx with exponential backoff.
pub struct StripeClient {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(base_url: String, secret_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            secret_key,
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn fetch_payment(&self, reference: &str) -> Result<PaymentRecord, PaymentError> {
        let url = format!("{}/v1/payment_intents/{reference}", self.base_url);

        let mut last_error: Option<PaymentError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Processor fetch attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.secret_key)
                .header("stripe-version", STRIPE_API_VERSION)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(PaymentError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 404 {
                return Err(PaymentError::NotFound(reference.to_string()));
            }

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Processor API returned {}: {}", status, body);
                last_error = Some(PaymentError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<StripeError>(&body)
                    .ok()
                    .and_then(|e| e.error.message)
                    .unwrap_or(body);
                return Err(PaymentError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let record: PaymentRecord = response.json().await?;
            debug!(
                "Fetched payment {} (status {}, amount {} {})",
                record.id, record.status, record.amount, record.currency
            );
            return Ok(record);
        }

        Err(last_error.unwrap_or(PaymentError::Unreachable {
            retries: MAX_RETRIES,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_metered_action_metadata() {
        let identity = Uuid::new_v4();
        let md = metadata(&[
            ("purpose", "metered_action"),
            ("identity_id", &identity.to_string()),
            ("action_type", "translate"),
        ]);
        assert_eq!(
            PaymentPurpose::from_metadata(&md),
            Ok(PaymentPurpose::MeteredAction {
                identity_id: identity,
                action: ActionType::Translate,
            })
        );
    }

    #[test]
    fn test_parse_plan_upgrade_metadata() {
        let account = Uuid::new_v4();
        let md = metadata(&[
            ("purpose", "plan_upgrade"),
            ("account_id", &account.to_string()),
            ("upgrade_tier", "lifetime"),
        ]);
        assert_eq!(
            PaymentPurpose::from_metadata(&md),
            Ok(PaymentPurpose::PlanUpgrade {
                account_id: account,
                tier: PlanTier::Lifetime,
            })
        );
    }

    #[test]
    fn test_missing_purpose_is_rejected() {
        let md = metadata(&[("identity_id", "x")]);
        assert_eq!(
            PaymentPurpose::from_metadata(&md),
            Err(MetadataError::MissingKey("purpose"))
        );
    }

    #[test]
    fn test_unknown_purpose_is_rejected() {
        let md = metadata(&[("purpose", "refund")]);
        assert_eq!(
            PaymentPurpose::from_metadata(&md),
            Err(MetadataError::UnknownPurpose("refund".to_string()))
        );
    }

    #[test]
    fn test_bad_action_type_is_rejected() {
        let identity = Uuid::new_v4();
        let md = metadata(&[
            ("purpose", "metered_action"),
            ("identity_id", &identity.to_string()),
            ("action_type", "download_french"),
        ]);
        assert!(matches!(
            PaymentPurpose::from_metadata(&md),
            Err(MetadataError::InvalidValue {
                key: "action_type",
                ..
            })
        ));
    }

    #[test]
    fn test_upgrade_to_metered_tier_is_rejected() {
        // Upgrades may only target unlimited tiers; a payment claiming to
        // buy "anonymous" is malformed metadata.
        let account = Uuid::new_v4();
        let md = metadata(&[
            ("purpose", "plan_upgrade"),
            ("account_id", &account.to_string()),
            ("upgrade_tier", "anonymous"),
        ]);
        assert!(matches!(
            PaymentPurpose::from_metadata(&md),
            Err(MetadataError::InvalidValue {
                key: "upgrade_tier",
                ..
            })
        ));
    }

    #[test]
    fn test_succeeded_status() {
        let record = PaymentRecord {
            id: "pi_1".to_string(),
            status: "succeeded".to_string(),
            amount: 299,
            currency: "eur".to_string(),
            metadata: HashMap::new(),
        };
        assert!(record.succeeded());

        let pending = PaymentRecord {
            status: "requires_payment_method".to_string(),
            ..record
        };
        assert!(!pending.succeeded());
    }
}
