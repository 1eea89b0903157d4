//! Builds new receipts and the approval-transition receipt that follows
//! one. Grounded on the original `pat/receipt.py`
//! (`next_event_id` / `build_new_receipt` / `build_approval_transition`)
//! and the teacher's `car.rs::build_car` (serialize, strip the fields
//! excluded from the hash domain, canonicalize, hash, then sign).

use crate::canon;
use crate::clock::Clock;
use crate::error::Result;
use crate::keyring::Keyring;
use crate::ledger::Ledger;
use crate::model::*;
use crate::policy::{extract_confidence, run_policy_checks};

/// Compute the next `event_id` as `"<ts_utc>_<NNNNN>"`, where `NNNNN` is
/// the 1-indexed, zero-padded count of receipts already in the ledger.
/// Must be called while holding the ledger lock so the count it reads
/// cannot race with a concurrent append (spec.md §5, §9).
fn next_event_id(ledger: &Ledger, ts_utc: &str) -> Result<String> {
    let n = ledger.read_all()?.len() + 1;
    Ok(format!("{ts_utc}_{n:05}"))
}

/// Build and append a brand-new receipt for a proposed action, running it
/// through the policy engine with `approval_present = false` (a freshly
/// submitted action is never pre-approved). Returns the appended receipt.
pub fn submit(
    ledger: &Ledger,
    clock: &dyn Clock,
    policy: &PolicyRuleSet,
    prompt: &str,
    model_output_raw: &str,
    proposed_action_type: &str,
    proposed_action_target: &str,
    proposed_action_params: serde_json::Value,
    confidence_override: Option<f64>,
) -> Result<Receipt> {
    ledger.with_lock(|| {
        let prev_hash = ledger.last_hash()?;
        let ts_utc = clock.now_rfc3339();
        let event_id = next_event_id(ledger, &ts_utc)?;

        let parsed_confidence = extract_confidence(model_output_raw);
        let effective_confidence = confidence_override.or(parsed_confidence);

        let outcome = run_policy_checks(proposed_action_type, effective_confidence, false, policy);
        let rules_hash = canon::rules_hash(policy)?;

        let mut receipt = Receipt {
            event_id,
            ts_utc,
            inputs: Inputs {
                prompt: prompt.to_string(),
                context: serde_json::json!({"source": "sim", "channel": "demo"}),
            },
            model_output: ModelOutput {
                raw: model_output_raw.to_string(),
                model: "demo-model".into(),
                temperature: 0.2,
                parsed_confidence,
                effective_confidence,
            },
            proposed_action: ProposedAction {
                action_type: proposed_action_type.trim().to_uppercase(),
                target: proposed_action_target.trim().to_string(),
                params: proposed_action_params,
            },
            policy: PolicySnapshot {
                policy_id: policy.policy_id.clone(),
                version: policy.version.clone(),
                rules_hash,
            },
            policy_checks: outcome.checks,
            decision: Decision {
                result: outcome.decision,
                reason: outcome.reason,
                decision_by: "policy_engine".into(),
            },
            approval: Approval {
                required: outcome.approval_required,
                approved: false,
                approver_id: None,
                public_key_b64: None,
                signature_alg: None,
                signature: None,
                signed_ts_utc: None,
            },
            actuation: Actuation {
                attempted: false,
                executed: false,
                actuation_event_id: None,
            },
            integrity: Integrity {
                prev_hash: prev_hash.clone(),
                canonical_hash: String::new(),
                this_hash: String::new(),
            },
        };

        let canonical_hash = canon::canonical_hash(&receipt)?;
        receipt.integrity.canonical_hash = canonical_hash.clone();
        receipt.integrity.this_hash = canon::this_hash(&prev_hash, &canonical_hash);

        ledger.append(&receipt)?;
        Ok(receipt)
    })
}

/// Build the approval-transition receipt that follows `latest`: marks it
/// approved by `approver_id`, re-runs the policy checks with
/// `approval_present = true`, signs the new canonical hash, and appends
/// the result as a new ledger entry (receipts are immutable once
/// written; approval is recorded as a follow-on entry, never an
/// in-place mutation, per spec.md §4.4).
pub fn approve(
    ledger: &Ledger,
    keyring: &Keyring,
    clock: &dyn Clock,
    policy: &PolicyRuleSet,
    latest: &Receipt,
    approver_id: &str,
) -> Result<Receipt> {
    ledger.with_lock(|| {
        let mut next = latest.clone();

        next.approval.required = true;
        next.approval.approved = true;
        next.approval.approver_id = Some(approver_id.to_string());
        next.approval.signature_alg = Some("ed25519".into());
        next.approval.public_key_b64 = keyring.public_key_b64(approver_id)?;
        next.approval.signed_ts_utc = Some(clock.now_rfc3339());

        let outcome = run_policy_checks(
            &next.proposed_action.action_type,
            next.model_output.effective_confidence,
            true,
            policy,
        );
        next.policy_checks = outcome.checks;
        next.decision.result = outcome.decision;
        next.decision.reason = outcome.reason;

        next.actuation.attempted = next.decision.result == DecisionResult::Permitted;
        next.actuation.executed = false;
        next.actuation.actuation_event_id = None;

        let prev_hash = ledger.last_hash()?;
        next.integrity.prev_hash = prev_hash.clone();

        let canonical_hash = canon::canonical_hash(&next)?;
        next.integrity.canonical_hash = canonical_hash.clone();

        next.approval.signature = Some(keyring.sign(approver_id, &canonical_hash)?);
        next.integrity.this_hash = canon::this_hash(&prev_hash, &canonical_hash);

        ledger.append(&next)?;
        Ok(next)
    })
}
