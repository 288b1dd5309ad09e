//! Fingerprint resolution — derives a stable pseudo-identity hash from
//! client-observable browser signals. This is a quota heuristic, not an
//! identity authority: collisions across devices only mean shared free
//! quota, and a client that sends no signals degrades to the sentinel
//! hash, which carries no free quota at all.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Fallback hash for clients whose signals are unavailable. Evaluated with
/// zero free quota so signal failure never grants anything silently.
pub const ANONYMOUS_SENTINEL: &str = "anonymous";

/// Derives the fingerprint hash from a signal map (user agent, screen
/// metrics, timezone, language — owned by the UI collaborator, opaque
/// here). Keys are sorted before hashing so the hash is stable regardless
/// of the order the client serialized them in.
pub fn resolve(signals: &serde_json::Map<String, serde_json::Value>) -> String {
    if signals.is_empty() {
        return ANONYMOUS_SENTINEL.to_string();
    }

    let canonical: BTreeMap<&str, String> = signals
        .iter()
        .map(|(k, v)| (k.as_str(), canonical_value(v)))
        .collect();

    let mut hasher = Sha256::new();
    for (key, value) in &canonical {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }

    hex_encode(&hasher.finalize())
}

pub fn is_sentinel(fingerprint_hash: &str) -> bool {
    fingerprint_hash == ANONYMOUS_SENTINEL
}

fn canonical_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signals(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_same_signals_same_hash() {
        let a = signals(&[("ua", json!("firefox")), ("tz", json!("Europe/Madrid"))]);
        let b = signals(&[("ua", json!("firefox")), ("tz", json!("Europe/Madrid"))]);
        assert_eq!(resolve(&a), resolve(&b));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a = signals(&[("ua", json!("firefox")), ("tz", json!("Europe/Madrid"))]);
        let b = signals(&[("tz", json!("Europe/Madrid")), ("ua", json!("firefox"))]);
        assert_eq!(resolve(&a), resolve(&b));
    }

    #[test]
    fn test_different_signals_different_hash() {
        let a = signals(&[("ua", json!("firefox"))]);
        let b = signals(&[("ua", json!("chrome"))]);
        assert_ne!(resolve(&a), resolve(&b));
    }

    #[test]
    fn test_empty_signals_fall_back_to_sentinel() {
        let empty = serde_json::Map::new();
        assert_eq!(resolve(&empty), ANONYMOUS_SENTINEL);
        assert!(is_sentinel(&resolve(&empty)));
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let a = signals(&[("ua", json!("firefox")), ("screen", json!(1440))]);
        let hash = resolve(&a);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!is_sentinel(&hash));
    }
}
