//! # Promotion Transition Planner
//!
//! The one-hop promotion state machine. States are ladder positions −1
//! (unassigned) through N−1 (terminal). Each invocation computes at most
//! one hop:
//!
//! - current at or past target → no-op (idempotence guarantee)
//! - next hop is non-terminal → promote to `ladder[current + 1]`
//! - next hop is terminal → release only when explicitly authorized for
//!   this invocation; otherwise defer as a successful no-op
//!
//! Advancing exactly one stage per invocation means every CI gate re-runs
//! the same step, so no intermediate stage's evidence gate can be skipped
//! even under re-runs or partial pipeline failures.

use crate::ladder::{LadderError, Stage, StageLadder};

/// The single action a promotion step should take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// Current stage is already at or past the target. Nothing to do.
    AlreadySatisfied {
        /// Ladder position of the current stage (−1 if unassigned).
        current_index: isize,
        /// Ladder position of the target stage.
        target_index: usize,
    },
    /// Issue a non-terminal promote call to this stage.
    Promote(Stage),
    /// Issue the terminal release call to this stage.
    Release(Stage),
    /// The next hop is the terminal stage but release was not authorized
    /// for this invocation. Successful no-op.
    ReleaseDeferred(Stage),
}

impl NextAction {
    /// Whether this action mutates platform state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(self, NextAction::Promote(_) | NextAction::Release(_))
    }

    /// The stage entered when this action succeeds, if any.
    #[must_use]
    pub fn entered_stage(&self) -> Option<&Stage> {
        match self {
            NextAction::Promote(stage) | NextAction::Release(stage) => Some(stage),
            _ => None,
        }
    }
}

/// Compute the single next hop for one promotion step.
///
/// `current_stage` is the platform's view of the version (either naming
/// form, or `None`/unmatched for unassigned); `target` is the
/// caller-supplied display name; `release_allowed` authorizes the terminal
/// hop for this invocation only.
///
/// # Errors
///
/// Returns [`LadderError::UnknownStage`] when the target is not a rung of
/// the ladder. An unknown *current* stage is not an error: the platform
/// may report stages this ladder does not manage, which read as
/// unassigned.
pub fn plan_step(
    ladder: &StageLadder,
    current_stage: Option<&str>,
    target: &str,
    release_allowed: bool,
) -> Result<NextAction, LadderError> {
    let current_index: isize = current_stage
        .and_then(|s| ladder.index_of(s))
        .map_or(-1, |i| i as isize);

    let target_stage = ladder.resolve(target)?;
    let target_index = target_stage.order;

    if current_index >= target_index as isize {
        return Ok(NextAction::AlreadySatisfied {
            current_index,
            target_index,
        });
    }

    let next_index = current_index + 1;
    // Guarded defensively; unreachable given the check above.
    if next_index > target_index as isize {
        return Ok(NextAction::AlreadySatisfied {
            current_index,
            target_index,
        });
    }

    let next_stage = match ladder.stage_at(next_index as usize) {
        Some(stage) => stage.clone(),
        None => {
            return Ok(NextAction::AlreadySatisfied {
                current_index,
                target_index,
            });
        }
    };

    if ladder.is_terminal(&next_stage) {
        if release_allowed {
            Ok(NextAction::Release(next_stage))
        } else {
            Ok(NextAction::ReleaseDeferred(next_stage))
        }
    } else {
        Ok(NextAction::Promote(next_stage))
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

    #[test]
    fn unassigned_promotes_to_first_rung() {
        let action = plan_step(&ladder(), None, "STAGING", false).unwrap();
        match action {
            NextAction::Promote(stage) => {
                assert_eq!(stage.display, "QA");
                assert_eq!(stage.api_name, "bookverse-QA");
            }
            other => panic!("expected Promote, got {other:?}"),
        }
    }

    #[test]
    fn qa_promotes_to_staging() {
        let action = plan_step(&ladder(), Some("bookverse-QA"), "STAGING", false).unwrap();
        match action {
            NextAction::Promote(stage) => assert_eq!(stage.api_name, "bookverse-STAGING"),
            other => panic!("expected Promote, got {other:?}"),
        }
    }

    #[test]
    fn at_target_is_noop() {
        let action = plan_step(&ladder(), Some("STAGING"), "STAGING", false).unwrap();
        assert_eq!(
            action,
            NextAction::AlreadySatisfied {
                current_index: 1,
                target_index: 1,
            }
        );
    }

    #[test]
    fn past_target_is_noop() {
        let action = plan_step(&ladder(), Some("PROD"), "QA", true).unwrap();
        assert_eq!(
            action,
            NextAction::AlreadySatisfied {
                current_index: 2,
                target_index: 0,
            }
        );
    }

    #[test]
    fn terminal_hop_requires_authorization() {
        let action = plan_step(&ladder(), Some("bookverse-STAGING"), "PROD", false).unwrap();
        match action {
            NextAction::ReleaseDeferred(stage) => assert_eq!(stage.display, "PROD"),
            other => panic!("expected ReleaseDeferred, got {other:?}"),
        }
    }

    #[test]
    fn terminal_hop_releases_when_authorized() {
        let action = plan_step(&ladder(), Some("bookverse-STAGING"), "PROD", true).unwrap();
        match action {
            NextAction::Release(stage) => {
                assert_eq!(stage.display, "PROD");
                assert_eq!(stage.api_name, "PROD");
            }
            other => panic!("expected Release, got {other:?}"),
        }
    }

    #[test]
    fn unknown_target_is_config_error() {
        let err = plan_step(&ladder(), None, "CANARY", false).unwrap_err();
        assert_eq!(err, LadderError::UnknownStage("CANARY".to_string()));
    }

    #[test]
    fn unknown_current_reads_as_unassigned() {
        // UNASSIGNED and DEV are both pre-stage-zero: not rungs.
        for current in ["UNASSIGNED", "DEV", "bookverse-DEV"] {
            let action = plan_step(&ladder(), Some(current), "QA", false).unwrap();
            match action {
                NextAction::Promote(stage) => assert_eq!(stage.display, "QA"),
                other => panic!("expected Promote, got {other:?}"),
            }
        }
    }

    #[test]
    fn walk_never_skips_a_rung() {
        // Simulate repeated invocations from unassigned to STAGING; each
        // hop must target exactly the next index.
        let ladder = ladder();
        let mut current: Option<String> = None;
        let mut hops = Vec::new();
        loop {
            let action = plan_step(&ladder, current.as_deref(), "STAGING", false).unwrap();
            match action {
                NextAction::Promote(stage) => {
                    hops.push(stage.display.clone());
                    current = Some(stage.api_name.clone());
                }
                NextAction::AlreadySatisfied { .. } => break,
                other => panic!("unexpected action {other:?}"),
            }
        }
        assert_eq!(hops, vec!["QA", "STAGING"]);
    }

    #[test]
    fn deferred_release_is_not_a_mutation() {
        let action = plan_step(&ladder(), Some("STAGING"), "PROD", false).unwrap();
        assert!(!action.is_mutation());
        assert!(action.entered_stage().is_none());
    }
}
