//! # Promotion Orchestrator
//!
//! Composes one idempotent promotion step: read the version's status,
//! plan the single next hop, execute it, re-read to confirm, then attach
//! stage evidence. Callable repeatedly (once per CI invocation) until the
//! version reaches the desired target.
//!
//! Failure asymmetry: configuration and platform-transition errors abort
//! the step (Fatal); evidence-submission errors are collected as
//! advisories and never change the step's outcome.

use crate::client::{ClientError, PlatformClient, PromotionRequest, ReleaseRequest};
use chrono::Utc;
use serde_json::Value;
use stagehand_core::context::{ContextError, OrchestrationContext, StepReport};
use stagehand_core::evidence::{EvidenceInputs, EvidencePredicate, predicates_for};
use stagehand_core::ladder::{LadderError, Stage, StageLadder};
use stagehand_core::transition::{NextAction, plan_step};
use stagehand_core::Severity;
use thiserror::Error;

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Fatal errors of a promotion step.
#[derive(Debug, Error)]
pub enum StepError {
    /// The requested target stage is not in the ladder, or the context is
    /// incomplete. No network call was attempted for the failing input.
    #[error("configuration error: {0}")]
    Config(String),

    /// A status/promote/release call failed. The step is aborted.
    #[error(transparent)]
    Upstream(#[from] ClientError),
}

impl From<LadderError> for StepError {
    fn from(err: LadderError) -> Self {
        StepError::Config(err.to_string())
    }
}

impl From<ContextError> for StepError {
    fn from(err: ContextError) -> Self {
        StepError::Config(err.to_string())
    }
}

impl StepError {
    /// Configuration and upstream failures always abort the step.
    #[must_use]
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

/// Advisory failure while synthesizing or submitting one predicate.
#[derive(Debug, Error)]
pub enum EvidenceError {
    /// Scratch file handling failed.
    #[error("evidence file error: {0}")]
    Io(#[from] std::io::Error),

    /// The predicate document could not be serialized or re-read.
    #[error("evidence document error: {0}")]
    Json(#[from] serde_json::Error),

    /// The evidence-recording call failed.
    #[error("evidence submission failed: {0}")]
    Submit(#[from] ClientError),
}

impl EvidenceError {
    /// Evidence failures never abort the step.
    #[must_use]
    pub fn severity(&self) -> Severity {
        Severity::Advisory
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// What a completed step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTaken {
    /// Current stage already at or past the target.
    AlreadySatisfied,
    /// Promoted into this stage.
    Promoted(Stage),
    /// Released into the terminal stage.
    Released(Stage),
    /// The terminal hop was next but not authorized; nothing was done.
    ReleaseDeferred(Stage),
}

impl ActionTaken {
    /// Short machine-readable label for reports and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ActionTaken::AlreadySatisfied => "no-op",
            ActionTaken::Promoted(_) => "promoted",
            ActionTaken::Released(_) => "released",
            ActionTaken::ReleaseDeferred(_) => "release-deferred",
        }
    }

    /// The stage entered by this step, if any.
    #[must_use]
    pub fn entered_stage(&self) -> Option<&Stage> {
        match self {
            ActionTaken::Promoted(stage) | ActionTaken::Released(stage) => Some(stage),
            _ => None,
        }
    }
}

/// Result of one promotion step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// What the step did.
    pub action: ActionTaken,
    /// Platform stage before the step, if assigned.
    pub stage_before: Option<String>,
    /// Platform stage after the step (re-read from the platform), if
    /// assigned.
    pub stage_after: Option<String>,
    /// Advisory evidence failures collected during the step.
    pub advisories: Vec<String>,
}

impl StepOutcome {
    /// Serialize the outcome as an explicit cross-invocation report.
    #[must_use]
    pub fn report(&self) -> StepReport {
        let mut report = StepReport::new(self.action.label());
        report.stage_before = self.stage_before.clone();
        report.stage_after = self.stage_after.clone();
        report.advisories = self.advisories.clone();
        if let Some(stage) = self.action.entered_stage() {
            report.record_promotion(stage.display.clone());
        }
        report
    }
}

// =============================================================================
// ORCHESTRATION
// =============================================================================

/// Execute one idempotent promotion step.
///
/// Performs one status read, at most one promote-or-release call, one
/// confirming re-read, and a small fixed number of best-effort evidence
/// submissions, in that strict order.
///
/// # Errors
///
/// Returns [`StepError::Config`] before any network call when the
/// context or target stage is invalid, and [`StepError::Upstream`] when
/// a status/promote/release call fails. Evidence failures are collected
/// in the outcome, never returned.
pub async fn advance_one_step(
    client: &PlatformClient,
    ladder: &StageLadder,
    ctx: &OrchestrationContext,
) -> Result<StepOutcome, StepError> {
    ctx.validate()?;
    // Resolve the target before touching the network; a bad target is a
    // configuration error, not a platform one.
    ladder.resolve(&ctx.target_stage)?;

    let status = client
        .fetch_status(&ctx.application_key, &ctx.version)
        .await?;
    let stage_before = status.current_stage.clone();
    let current = if status.is_unassigned() {
        None
    } else {
        status.current_stage.as_deref()
    };

    let action = plan_step(ladder, current, &ctx.target_stage, ctx.release_allowed)?;

    let entered = match action {
        NextAction::AlreadySatisfied {
            current_index,
            target_index,
        } => {
            println!(
                "{}@{}: already at or past {} (current index {}, target index {}); nothing to do",
                ctx.application_key, ctx.version, ctx.target_stage, current_index, target_index
            );
            return Ok(StepOutcome {
                action: ActionTaken::AlreadySatisfied,
                stage_before: stage_before.clone(),
                stage_after: stage_before,
                advisories: Vec::new(),
            });
        }
        NextAction::ReleaseDeferred(stage) => {
            println!(
                "{}@{}: next hop is terminal stage {} but release is not authorized for this invocation; deferring",
                ctx.application_key, ctx.version, stage.display
            );
            return Ok(StepOutcome {
                action: ActionTaken::ReleaseDeferred(stage),
                stage_before: stage_before.clone(),
                stage_after: stage_before,
                advisories: Vec::new(),
            });
        }
        NextAction::Promote(stage) => {
            println!(
                "{}@{}: promoting to {}",
                ctx.application_key, ctx.version, stage.api_name
            );
            let request = PromotionRequest::move_to(&stage.api_name);
            client
                .promote(&ctx.application_key, &ctx.version, &request)
                .await?;
            ActionTaken::Promoted(stage)
        }
        NextAction::Release(stage) => {
            println!(
                "{}@{}: releasing to {}",
                ctx.application_key, ctx.version, stage.display
            );
            let request = ReleaseRequest {
                promotion_type: "move".to_string(),
                included_repository_keys: ctx.release_repository_keys(),
            };
            client
                .release(&ctx.application_key, &ctx.version, &request)
                .await?;
            ActionTaken::Released(stage)
        }
    };

    // Confirm the transition landed; a failed re-read is fatal.
    let confirmed = client
        .fetch_status(&ctx.application_key, &ctx.version)
        .await?;
    let stage_after = confirmed.current_stage.clone();
    if let Some(after) = stage_after.as_deref() {
        println!("{}@{}: platform reports stage {}", ctx.application_key, ctx.version, after);
    }

    let mut advisories = Vec::new();
    if let Some(stage) = match &entered {
        ActionTaken::Promoted(stage) | ActionTaken::Released(stage) => Some(stage.clone()),
        _ => None,
    } {
        advisories = attach_evidence(client, ladder, ctx, &stage).await;
    }

    Ok(StepOutcome {
        action: entered,
        stage_before,
        stage_after,
        advisories,
    })
}

/// Attach every predicate of the stage's policy, best-effort.
///
/// Returns the advisory failures; the caller's outcome stays successful
/// regardless.
async fn attach_evidence(
    client: &PlatformClient,
    ladder: &StageLadder,
    ctx: &OrchestrationContext,
    stage: &Stage,
) -> Vec<String> {
    let recorded_at = Utc::now().to_rfc3339();
    let inputs = EvidenceInputs {
        application_key: &ctx.application_key,
        version: &ctx.version,
        recorded_at: &recorded_at,
        source_commit: ctx.source_commit.as_deref(),
    };

    let mut advisories = Vec::new();
    for predicate in predicates_for(ladder, stage, &inputs) {
        match attach_predicate(client, ctx, &predicate).await {
            Ok(()) => {
                println!(
                    "{}@{}: attached {} evidence for stage {}",
                    ctx.application_key, ctx.version, predicate.name, stage.display
                );
            }
            // Aggregation happens here, per call site: every evidence
            // failure carries an Advisory tag and lands in the outcome,
            // never in the step's Result.
            Err(err) => {
                let severity = err.severity();
                let advisory = format!("{}: {}", predicate.name, err);
                tracing::warn!(
                    predicate = %predicate.name,
                    stage = %stage.display,
                    ?severity,
                    "evidence attachment failed: {err}"
                );
                advisories.push(advisory);
            }
        }
    }
    advisories
}

/// Submit one predicate through a scratch file in the working directory.
///
/// The file is created and consumed within this call and removed on all
/// exit paths (RAII), so no stale predicate can leak into a later step's
/// working directory.
async fn attach_predicate(
    client: &PlatformClient,
    ctx: &OrchestrationContext,
    predicate: &EvidencePredicate,
) -> Result<(), EvidenceError> {
    let mut scratch = tempfile::Builder::new()
        .prefix(&format!("evidence-{}-", predicate.name))
        .suffix(".json")
        .tempfile_in(".")?;

    serde_json::to_writer_pretty(scratch.as_file_mut(), &predicate.payload)?;

    let document: Value = serde_json::from_reader(scratch.reopen()?)?;
    client
        .create_evidence(
            &ctx.application_key,
            &ctx.version,
            &predicate.predicate_type,
            &document,
            &ctx.provider_id,
            ctx.signing_key_alias.as_deref(),
        )
        .await?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use stagehand_core::ladder::StageLadder;

    fn stage(ladder: &StageLadder, name: &str) -> Stage {
        ladder.resolve(name).unwrap().clone()
    }

    #[test]
    fn outcome_report_records_entered_stage() {
        let ladder = StageLadder::with_defaults("bookverse").unwrap();
        let outcome = StepOutcome {
            action: ActionTaken::Promoted(stage(&ladder, "QA")),
            stage_before: Some("bookverse-DEV".to_string()),
            stage_after: Some("bookverse-QA".to_string()),
            advisories: vec!["dast-scan: submission failed".to_string()],
        };
        let report = outcome.report();
        assert_eq!(report.action, "promoted");
        assert_eq!(report.promoted_stages, vec!["QA"]);
        assert_eq!(report.advisories.len(), 1);
    }

    #[test]
    fn noop_report_has_no_promotions() {
        let outcome = StepOutcome {
            action: ActionTaken::AlreadySatisfied,
            stage_before: Some("bookverse-STAGING".to_string()),
            stage_after: Some("bookverse-STAGING".to_string()),
            advisories: Vec::new(),
        };
        let report = outcome.report();
        assert_eq!(report.action, "no-op");
        assert!(report.promoted_stages.is_empty());
    }

    #[test]
    fn deferred_release_label() {
        let ladder = StageLadder::with_defaults("bookverse").unwrap();
        let action = ActionTaken::ReleaseDeferred(stage(&ladder, "PROD"));
        assert_eq!(action.label(), "release-deferred");
        assert!(action.entered_stage().is_none());
    }

    #[test]
    fn evidence_errors_are_advisory() {
        let err = EvidenceError::Io(std::io::Error::other("disk full"));
        assert_eq!(err.severity(), Severity::Advisory);
    }

    #[test]
    fn step_errors_are_fatal() {
        let err = StepError::Config("stage 'X' is not in the ladder".to_string());
        assert_eq!(err.severity(), Severity::Fatal);
    }
}
