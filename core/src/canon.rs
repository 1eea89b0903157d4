//! Deterministic JSON serialization and the hash helpers built on it.
//!
//! Canonicalization follows JSON Canonicalization Scheme (JCS, RFC 8785):
//! object keys sorted by Unicode code point, no insignificant whitespace,
//! shortest round-trip number formatting, raw (non-escaped) non-ASCII UTF-8.
//! This matches the rules the teacher already relies on
//! (`serde_jcs::to_vec`, used the same way in the standalone CAR verifier)
//! and the exact behavior of `json.dumps(..., sort_keys=True,
//! separators=(",", ":"), ensure_ascii=False)` in the original source.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::CanonError;
use crate::model::{PolicyRuleSet, Receipt};

const RULES_NOTES: &str =
    "Demo policy: high-stakes require human approval; confidence threshold gate.";

/// Serialize `value` to canonical JSON bytes (JCS).
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonError> {
    serde_jcs::to_vec(value).map_err(|err| CanonError::Serialize(err.to_string()))
}

/// Lowercase hex-encoded SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[derive(Serialize)]
struct RulesDoc<'a> {
    policy_id: &'a str,
    version: &'a str,
    high_stakes_actions: &'a [String],
    confidence_threshold: f64,
    notes: &'static str,
}

/// `"sha256:" + sha256_hex(canonical_json({policy_id, version,
/// high_stakes_actions, confidence_threshold, notes}))`.
pub fn rules_hash(policy: &PolicyRuleSet) -> Result<String, CanonError> {
    let doc = RulesDoc {
        policy_id: &policy.policy_id,
        version: &policy.version,
        high_stakes_actions: &policy.high_stakes_actions,
        confidence_threshold: policy.confidence_threshold,
        notes: RULES_NOTES,
    };
    let bytes = to_canonical_bytes(&doc)?;
    Ok(format!("sha256:{}", sha256_hex(&bytes)))
}

/// The canonical hash domain for a receipt: canonical JSON of the receipt
/// with `integrity.canonical_hash`, `integrity.this_hash`,
/// `integrity.verified_at`, and `approval.signature` *removed* (not
/// nulled) so the hash is stable across the pre-sign and post-sign states
/// (spec invariant: signing must not invalidate the hash it signs over).
/// `canonical_hash` itself has to be excluded too: at build time the
/// field holds a placeholder (it hasn't been computed yet), but at
/// verify time it holds the real value, so leaving it in the hash domain
/// would make the hash depend on whether it had already been computed.
pub fn canonical_hash(receipt: &Receipt) -> Result<String, CanonError> {
    let mut value =
        serde_json::to_value(receipt).map_err(|err| CanonError::Serialize(err.to_string()))?;
    strip_hash_excluded_fields(&mut value);
    let bytes = to_canonical_bytes(&value)?;
    Ok(format!("sha256:{}", sha256_hex(&bytes)))
}

fn strip_hash_excluded_fields(value: &mut Value) {
    if let Some(integrity) = value.get_mut("integrity").and_then(Value::as_object_mut) {
        integrity.remove("canonical_hash");
        integrity.remove("this_hash");
        integrity.remove("verified_at");
    }
    if let Some(approval) = value.get_mut("approval").and_then(Value::as_object_mut) {
        approval.remove("signature");
    }
}

/// `"sha256:" + sha256_hex(utf8(prev_hash + "|" + canonical_hash))`, the
/// chain link between consecutive ledger entries.
pub fn this_hash(prev_hash: &str, canonical_hash: &str) -> String {
    let msg = format!("{prev_hash}|{canonical_hash}");
    format!("sha256:{}", sha256_hex(msg.as_bytes()))
}

/// `"sha256:" + 64 * "0"`, the genesis `prev_hash`.
pub fn genesis_hash() -> String {
    format!("sha256:{}", "0".repeat(64))
}
