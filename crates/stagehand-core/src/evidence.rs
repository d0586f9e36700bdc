//! # Evidence Policy
//!
//! Per-stage synthesis of compliance evidence predicates.
//!
//! A predicate is a typed JSON document attesting to a fact about a
//! version at the stage it just entered, and it declares the downstream
//! stage it gates. Synthesis is pure document assembly: timestamps and
//! commit identifiers are caller inputs so this module stays clock-free.
//!
//! The fixed demo policy:
//! - Unassigned / DEV: no evidence
//! - QA: dynamic-scan result + API-test-collection result, gating the hop
//!   out of QA
//! - STAGING: infrastructure-scan + penetration-test + change-approval,
//!   gating the terminal hop. This module is the single owner of these
//!   predicates; callers must not attach them a second time.
//! - Terminal: deployment-sync predicate referencing the triggering commit

use crate::ladder::{Stage, StageLadder};
use serde_json::{Value, json};

// =============================================================================
// PREDICATE TYPE URIS
// =============================================================================

/// Dynamic application security scan result.
pub const PREDICATE_TYPE_DAST: &str = "https://stagehand.dev/evidence/dast/v1";

/// API test collection run result.
pub const PREDICATE_TYPE_API_TESTS: &str = "https://stagehand.dev/evidence/api-test-collection/v1";

/// Infrastructure configuration scan result.
pub const PREDICATE_TYPE_IAC_SCAN: &str = "https://stagehand.dev/evidence/iac-scan/v1";

/// Penetration test attestation.
pub const PREDICATE_TYPE_PENTEST: &str = "https://stagehand.dev/evidence/pentest/v1";

/// Change approval record.
pub const PREDICATE_TYPE_CHANGE_APPROVAL: &str =
    "https://stagehand.dev/evidence/change-approval/v1";

/// Deployment synchronization record for the terminal stage.
pub const PREDICATE_TYPE_DEPLOYMENT: &str = "https://stagehand.dev/evidence/deployment-sync/v1";

// =============================================================================
// TYPES
// =============================================================================

/// A stage-scoped evidence document ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidencePredicate {
    /// Short slug used for file naming and log lines, e.g. "dast-scan".
    pub name: String,
    /// Predicate type URI.
    pub predicate_type: String,
    /// The predicate document itself.
    pub payload: Value,
    /// Display name of the stage this predicate belongs to.
    pub target_stage: String,
    /// Display name of the downstream stage this predicate gates, if any.
    pub gate_for: Option<String>,
}

/// Caller-supplied inputs for predicate synthesis.
///
/// The core never reads the clock or the environment; everything
/// time- or build-dependent arrives here.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceInputs<'a> {
    /// Application key, e.g. "bookverse-inventory".
    pub application_key: &'a str,
    /// Version string being promoted.
    pub version: &'a str,
    /// RFC 3339 timestamp of the promotion step.
    pub recorded_at: &'a str,
    /// Commit that triggered the pipeline, when known.
    pub source_commit: Option<&'a str>,
}

// =============================================================================
// POLICY
// =============================================================================

/// Synthesize the predicates for a stage the version just entered.
///
/// Returns an empty list for stages with no evidence in the policy
/// (DEV, or any stage this policy does not know). The gated stage is the
/// next rung of the ladder, so a QA predicate declares it gates the hop
/// into STAGING and a STAGING predicate the hop into the terminal stage.
#[must_use]
pub fn predicates_for(
    ladder: &StageLadder,
    stage: &Stage,
    inputs: &EvidenceInputs<'_>,
) -> Vec<EvidencePredicate> {
    let gate_for = ladder
        .stage_at(stage.order + 1)
        .map(|next| next.display.clone());

    if ladder.is_terminal(stage) {
        return vec![deployment_sync(stage, inputs)];
    }

    match stage.display.as_str() {
        "QA" => vec![
            scan_result(
                "dast-scan",
                PREDICATE_TYPE_DAST,
                "dynamic application security scan",
                stage,
                gate_for.clone(),
                inputs,
            ),
            scan_result(
                "api-test-collection",
                PREDICATE_TYPE_API_TESTS,
                "API test collection run",
                stage,
                gate_for,
                inputs,
            ),
        ],
        "STAGING" => vec![
            scan_result(
                "iac-scan",
                PREDICATE_TYPE_IAC_SCAN,
                "infrastructure configuration scan",
                stage,
                gate_for.clone(),
                inputs,
            ),
            scan_result(
                "pentest",
                PREDICATE_TYPE_PENTEST,
                "penetration test",
                stage,
                gate_for.clone(),
                inputs,
            ),
            scan_result(
                "change-approval",
                PREDICATE_TYPE_CHANGE_APPROVAL,
                "change approval",
                stage,
                gate_for,
                inputs,
            ),
        ],
        _ => Vec::new(),
    }
}

/// A generic pass/fail attestation payload shared by the scan-shaped
/// predicates.
fn scan_result(
    name: &str,
    predicate_type: &str,
    description: &str,
    stage: &Stage,
    gate_for: Option<String>,
    inputs: &EvidenceInputs<'_>,
) -> EvidencePredicate {
    let payload = json!({
        "application_key": inputs.application_key,
        "version": inputs.version,
        "stage": stage.display,
        "description": description,
        "result": "passed",
        "gates_stage": gate_for.as_deref(),
        "recorded_at": inputs.recorded_at,
    });
    EvidencePredicate {
        name: name.to_string(),
        predicate_type: predicate_type.to_string(),
        payload,
        target_stage: stage.display.clone(),
        gate_for,
    }
}

/// Terminal-stage predicate tying the release to the triggering commit.
fn deployment_sync(stage: &Stage, inputs: &EvidenceInputs<'_>) -> EvidencePredicate {
    let payload = json!({
        "application_key": inputs.application_key,
        "version": inputs.version,
        "stage": stage.display,
        "description": "deployment synchronization",
        "source_commit": inputs.source_commit,
        "recorded_at": inputs.recorded_at,
    });
    EvidencePredicate {
        name: "deployment-sync".to_string(),
        predicate_type: PREDICATE_TYPE_DEPLOYMENT.to_string(),
        payload,
        target_stage: stage.display.clone(),
        gate_for: None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::ladder::StageLadder;

    fn ladder() -> StageLadder {
        StageLadder::with_defaults("bookverse").unwrap()
    }

    fn inputs() -> EvidenceInputs<'static> {
        EvidenceInputs {
            application_key: "bookverse-inventory",
            version: "1.2.3",
            recorded_at: "2026-08-06T12:00:00Z",
            source_commit: Some("abc1234"),
        }
    }

    #[test]
    fn dev_has_no_evidence() {
        // A ladder that promotes into DEV still attaches nothing there.
        let names: Vec<String> = ["DEV", "QA", "STAGING", "PROD"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        let l = StageLadder::new("bookverse", &names, "PROD").unwrap();
        let dev = l.resolve("DEV").unwrap();
        assert!(predicates_for(&l, dev, &inputs()).is_empty());
    }

    #[test]
    fn qa_emits_dast_and_api_tests_gating_staging() {
        let l = ladder();
        let qa = l.resolve("QA").unwrap();
        let preds = predicates_for(&l, qa, &inputs());
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].predicate_type, PREDICATE_TYPE_DAST);
        assert_eq!(preds[1].predicate_type, PREDICATE_TYPE_API_TESTS);
        for p in &preds {
            assert_eq!(p.target_stage, "QA");
            assert_eq!(p.gate_for.as_deref(), Some("STAGING"));
            assert_eq!(p.payload["gates_stage"], "STAGING");
            assert_eq!(p.payload["version"], "1.2.3");
        }
    }

    #[test]
    fn staging_emits_three_predicates_gating_prod() {
        let l = ladder();
        let staging = l.resolve("STAGING").unwrap();
        let preds = predicates_for(&l, staging, &inputs());
        let types: Vec<&str> = preds.iter().map(|p| p.predicate_type.as_str()).collect();
        assert_eq!(
            types,
            vec![
                PREDICATE_TYPE_IAC_SCAN,
                PREDICATE_TYPE_PENTEST,
                PREDICATE_TYPE_CHANGE_APPROVAL,
            ]
        );
        for p in &preds {
            assert_eq!(p.gate_for.as_deref(), Some("PROD"));
        }
    }

    #[test]
    fn prod_emits_deployment_sync_with_commit() {
        let l = ladder();
        let prod = l.resolve("PROD").unwrap();
        let preds = predicates_for(&l, prod, &inputs());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].predicate_type, PREDICATE_TYPE_DEPLOYMENT);
        assert_eq!(preds[0].payload["source_commit"], "abc1234");
        assert!(preds[0].gate_for.is_none());
    }

    #[test]
    fn prod_without_commit_is_null_not_missing() {
        let l = ladder();
        let prod = l.resolve("PROD").unwrap();
        let inputs = EvidenceInputs {
            source_commit: None,
            ..inputs()
        };
        let preds = predicates_for(&l, prod, &inputs);
        assert!(preds[0].payload["source_commit"].is_null());
    }

    #[test]
    fn unknown_stage_name_has_no_evidence() {
        // A custom ladder rung outside the demo policy gets nothing.
        let names: Vec<String> = ["DEV", "CANARY", "PROD"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        let l = StageLadder::new("p", &names, "PROD").unwrap();
        let canary = l.resolve("CANARY").unwrap();
        assert!(predicates_for(&l, canary, &inputs()).is_empty());
    }

    #[test]
    fn payload_carries_step_timestamp() {
        let l = ladder();
        let qa = l.resolve("QA").unwrap();
        let preds = predicates_for(&l, qa, &inputs());
        assert_eq!(preds[0].payload["recorded_at"], "2026-08-06T12:00:00Z");
    }
}
