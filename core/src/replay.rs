//! Recompute a stored receipt's policy outcome from its own recorded
//! inputs and compare it against what was written. Grounded on the
//! original `pat/replay.py::replay_and_compare` and the teacher's
//! `replay.rs` (recompute-then-digest-compare pattern).

use serde::Serialize;
use serde_json::Value;

use crate::canon::sha256_hex;
use crate::error::Result;
use crate::model::{DecisionResult, PolicyCheck, PolicyRuleSet, Receipt};
use crate::policy::run_policy_checks;

#[derive(Debug, Clone, Serialize)]
pub struct RecomputedOutcome {
    pub policy_checks: Vec<PolicyCheck>,
    pub decision: DecisionResult,
    pub reason: String,
    pub approval_required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredOutcome {
    pub policy_checks: Vec<PolicyCheck>,
    pub decision: DecisionResult,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub recomputed: RecomputedOutcome,
    pub stored: StoredOutcome,
    pub r#match: bool,
}

/// Re-run the policy engine over `receipt`'s own recorded proposed
/// action, effective confidence, and approval status, and compare the
/// result to what is stored on the receipt. A ruleset change (a
/// different `policy` than the one the receipt was originally decided
/// under) is exactly the case this is meant to surface as a mismatch.
#[derive(Serialize)]
struct DigestBlob<'a> {
    checks: &'a [PolicyCheck],
    decision: DecisionResult,
    reason: &'a str,
}

pub fn replay_and_compare(receipt: &Receipt, policy: &PolicyRuleSet) -> Result<ReplayReport> {
    let approved = receipt.approval.approved;
    let outcome = run_policy_checks(
        &receipt.proposed_action.action_type,
        receipt.model_output.effective_confidence,
        approved,
        policy,
    );

    let recomputed_blob = DigestBlob {
        checks: &outcome.checks,
        decision: outcome.decision,
        reason: &outcome.reason,
    };
    let stored_blob = DigestBlob {
        checks: &receipt.policy_checks,
        decision: receipt.decision.result,
        reason: &receipt.decision.reason,
    };

    let recomputed_bytes = crate::canon::to_canonical_bytes(&recomputed_blob)?;
    let stored_bytes = crate::canon::to_canonical_bytes(&stored_blob)?;
    let matched = sha256_hex(&recomputed_bytes) == sha256_hex(&stored_bytes);

    Ok(ReplayReport {
        recomputed: RecomputedOutcome {
            policy_checks: outcome.checks,
            decision: outcome.decision,
            reason: outcome.reason,
            approval_required: outcome.approval_required,
        },
        stored: StoredOutcome {
            policy_checks: receipt.policy_checks.clone(),
            decision: receipt.decision.result,
            reason: receipt.decision.reason.clone(),
        },
        r#match: matched,
    })
}

/// Convenience wrapper returning the raw recomputed JSON value, used by
/// the CLI's `replay` command for display.
pub fn replay_and_compare_json(receipt: &Receipt, policy: &PolicyRuleSet) -> Result<Value> {
    let report = replay_and_compare(receipt, policy)?;
    Ok(serde_json::to_value(report).map_err(|e| crate::error::CanonError::Serialize(e.to_string()))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::ledger::Ledger;
    use crate::receipt::submit;
    use chrono::{TimeZone, Utc};

    fn policy() -> PolicyRuleSet {
        PolicyRuleSet {
            policy_id: "PAT_DEMO_001".into(),
            version: "0.2.0".into(),
            high_stakes_actions: vec!["LOCKDOWN".into()],
            confidence_threshold: 0.85,
        }
    }

    #[test]
    fn replay_matches_when_policy_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("log.jsonl"));
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap());
        let receipt = submit(
            &ledger,
            &clock,
            &policy(),
            "p",
            "confidence: 0.92",
            "NOTIFY",
            "X",
            serde_json::json!({}),
            None,
        )
        .unwrap();

        let report = replay_and_compare(&receipt, &policy()).unwrap();
        assert!(report.r#match);
    }

    #[test]
    fn replay_mismatches_when_threshold_tightens() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("log.jsonl"));
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap());
        let receipt = submit(
            &ledger,
            &clock,
            &policy(),
            "p",
            "confidence: 0.90",
            "NOTIFY",
            "X",
            serde_json::json!({}),
            None,
        )
        .unwrap();

        let mut tightened = policy();
        tightened.confidence_threshold = 0.95;
        let report = replay_and_compare(&receipt, &tightened).unwrap();
        assert!(!report.r#match);
        assert_eq!(report.recomputed.decision, DecisionResult::Blocked);
    }
}
