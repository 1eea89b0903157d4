//! The pure policy engine: confidence extraction and the ordered sequence
//! of policy checks that terminate in a PERMITTED/BLOCKED decision.
//! Grounded on the original `pat/policy.py` (check ordering and early
//! returns) and the teacher's `governance.rs` (`enforce_policy`'s
//! "return the first blocking result" shape).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::model::{CheckId, CheckResult, DecisionResult, PolicyCheck, PolicyRuleSet, LOW_STAKES_ACTIONS};

static CONFIDENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"confidence\s*[:=]\s*([0-9]*\.?[0-9]+)\s*(%)?").unwrap());

/// Pull a confidence value out of free-text model output. Returns `None`
/// when no `confidence: <n>` token is present. A trailing `%` or a raw
/// value greater than 1.0 is treated as a percentage and divided by 100;
/// the result is clamped to `[0.0, 1.0]`.
pub fn extract_confidence(model_output_raw: &str) -> Option<f64> {
    let lower = model_output_raw.to_lowercase();
    let caps = CONFIDENCE_RE.captures(&lower)?;
    let mut val: f64 = caps.get(1)?.as_str().parse().ok()?;
    if caps.get(2).is_some() || val > 1.0 {
        if val > 1.0 {
            val /= 100.0;
        }
    }
    Some(val.clamp(0.0, 1.0))
}

/// Allowed-action universe: the ruleset's `high_stakes_actions` plus the
/// fixed low-stakes set.
fn is_allowed(action_type: &str, policy: &PolicyRuleSet) -> bool {
    policy.is_high_stakes(action_type) || LOW_STAKES_ACTIONS.contains(&action_type)
}

/// The result of running the ordered policy checks: the checks
/// themselves, the terminal decision, its reason, and whether the action
/// required human authorization.
pub struct PolicyOutcome {
    pub checks: Vec<PolicyCheck>,
    pub decision: DecisionResult,
    pub reason: String,
    pub approval_required: bool,
}

/// Run the ordered policy checks for one proposed action. Mirrors
/// `run_policy_checks` in the original source: `ALLOWED_ACTIONS` first
/// (short-circuits on failure), then a confidence check
/// (`CONFIDENCE_PRESENT` if absent, else `CONFIDENCE_THRESHOLD`), then a
/// human-authorization check, and finally a terminal decision derived
/// from whether approval is required and whether confidence clears the
/// threshold.
pub fn run_policy_checks(
    proposed_action_type: &str,
    confidence: Option<f64>,
    approval_present: bool,
    policy: &PolicyRuleSet,
) -> PolicyOutcome {
    let action_type = proposed_action_type.trim().to_uppercase();
    let approval_required = policy.is_high_stakes(&action_type);

    let mut checks = Vec::new();

    let allowed = is_allowed(&action_type, policy);
    checks.push(PolicyCheck {
        check_id: CheckId::AllowedActions,
        result: if allowed { CheckResult::Pass } else { CheckResult::Fail },
        details: json!({"action_type": action_type, "allowed": allowed}),
    });
    if !allowed {
        return PolicyOutcome {
            checks,
            decision: DecisionResult::Blocked,
            reason: "Action not in allowed list".into(),
            approval_required,
        };
    }

    match confidence {
        None => checks.push(PolicyCheck {
            check_id: CheckId::ConfidencePresent,
            result: CheckResult::Fail,
            details: json!({"confidence": null, "note": "No confidence provided/parsed"}),
        }),
        Some(c) => checks.push(PolicyCheck {
            check_id: CheckId::ConfidenceThreshold,
            result: if c >= policy.confidence_threshold { CheckResult::Pass } else { CheckResult::Fail },
            details: json!({"confidence": c, "threshold": policy.confidence_threshold}),
        }),
    }

    if approval_required {
        checks.push(PolicyCheck {
            check_id: CheckId::HumanAuthRequired,
            result: if approval_present { CheckResult::Pass } else { CheckResult::Fail },
            details: json!({"required": true, "present": approval_present}),
        });
    } else {
        checks.push(PolicyCheck {
            check_id: CheckId::HumanAuthNotRequired,
            result: CheckResult::Pass,
            details: json!({"required": false, "present": approval_present}),
        });
    }

    if approval_required {
        if !approval_present {
            return PolicyOutcome {
                checks,
                decision: DecisionResult::Blocked,
                reason: "High-stakes action requires human authorization".into(),
                approval_required,
            };
        }
        if confidence.map_or(true, |c| c < policy.confidence_threshold) {
            return PolicyOutcome {
                checks,
                decision: DecisionResult::Blocked,
                reason: "Confidence < threshold for high-stakes action".into(),
                approval_required,
            };
        }
        return PolicyOutcome {
            checks,
            decision: DecisionResult::Permitted,
            reason: "Approved + confidence >= threshold".into(),
            approval_required,
        };
    }

    match confidence {
        None => PolicyOutcome {
            checks,
            decision: DecisionResult::Blocked,
            reason: "No confidence available".into(),
            approval_required,
        },
        Some(c) if c < policy.confidence_threshold => PolicyOutcome {
            checks,
            decision: DecisionResult::Blocked,
            reason: "Confidence < threshold".into(),
            approval_required,
        },
        Some(_) => PolicyOutcome {
            checks,
            decision: DecisionResult::Permitted,
            reason: "Confidence >= threshold".into(),
            approval_required,
        },
    }
}
