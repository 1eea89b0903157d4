//! The wire data model. Field names match spec.md §3 verbatim because the
//! on-disk canonical-JSON ledger line *is* the normative contract — no
//! renaming for Rust convention is applied anywhere it would change the
//! serialized key. Grounded on the teacher's `car.rs`, whose CAR structs
//! use the same "derive everything, mirror the wire shape 1:1" style.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable policy snapshot. Hashes to [`crate::canon::rules_hash`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRuleSet {
    pub policy_id: String,
    pub version: String,
    /// Ordered; membership and order both matter for `rules_hash`.
    pub high_stakes_actions: Vec<String>,
    pub confidence_threshold: f64,
}

impl PolicyRuleSet {
    pub fn is_high_stakes(&self, action_type: &str) -> bool {
        self.high_stakes_actions.iter().any(|a| a == action_type)
    }
}

/// The fixed low-stakes action universe (spec.md §4.2): not configurable
/// per ruleset, unlike `high_stakes_actions`.
pub const LOW_STAKES_ACTIONS: [&str; 3] = ["NOTIFY", "LOG_ONLY", "NOOP"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckId {
    AllowedActions,
    ConfidencePresent,
    ConfidenceThreshold,
    HumanAuthRequired,
    HumanAuthNotRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckResult {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCheck {
    pub check_id: CheckId,
    pub result: CheckResult,
    pub details: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionResult {
    Permitted,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub result: DecisionResult,
    pub reason: String,
    pub decision_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inputs {
    pub prompt: String,
    pub context: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub raw: String,
    pub model: String,
    pub temperature: f64,
    pub parsed_confidence: Option<f64>,
    pub effective_confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub target: String,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub policy_id: String,
    pub version: String,
    pub rules_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub required: bool,
    pub approved: bool,
    pub approver_id: Option<String>,
    pub public_key_b64: Option<String>,
    pub signature_alg: Option<String>,
    pub signature: Option<String>,
    pub signed_ts_utc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actuation {
    pub attempted: bool,
    pub executed: bool,
    pub actuation_event_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integrity {
    pub prev_hash: String,
    pub canonical_hash: String,
    pub this_hash: String,
}

/// The immutable, once-appended decision receipt (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub event_id: String,
    pub ts_utc: String,
    pub inputs: Inputs,
    pub model_output: ModelOutput,
    pub proposed_action: ProposedAction,
    pub policy: PolicySnapshot,
    pub policy_checks: Vec<PolicyCheck>,
    pub decision: Decision,
    pub approval: Approval,
    pub actuation: Actuation,
    pub integrity: Integrity,
}

/// A keyring entry: one approver's ed25519 keypair, stored in the clear
/// (spec.md §4.3 — explicitly documented demo behavior, not a defect).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyringEntry {
    pub alg: String,
    pub private_key_b64: String,
    pub public_key_b64: String,
    pub created_utc: String,
}
