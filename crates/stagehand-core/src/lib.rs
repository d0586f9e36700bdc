//! # Stagehand Core - The Logic
//!
//! Deterministic promotion engine for application versions.
//!
//! An application version moves through an ordered ladder of lifecycle
//! stages (e.g. DEV → QA → STAGING → PROD) on an external lifecycle
//! platform. This crate decides *what* the next hop is and *which*
//! compliance evidence belongs to a stage; it never talks to the network.
//! The binary in `apps/stagehand` executes the decisions.
//!
//! ## Modules
//!
//! - [`ladder`] — the ordered stage ladder and display/API naming rules
//! - [`transition`] — the one-hop promotion state machine
//! - [`evidence`] — per-stage evidence predicate policy
//! - [`context`] — immutable per-step inputs and the explicit step report
//!
//! ## Constraints
//!
//! - No async, no network, no wall clock; timestamps are caller inputs
//! - Every decision is a pure function of the ladder and the inputs
//! - Promotion advances exactly one stage per step, so a re-run can never
//!   skip a stage's evidence gate

pub mod context;
pub mod evidence;
pub mod ladder;
pub mod transition;

pub use context::{ContextError, OrchestrationContext, StepReport, Verbosity};
pub use evidence::{EvidenceInputs, EvidencePredicate, predicates_for};
pub use ladder::{LadderError, Stage, StageLadder};
pub use transition::{NextAction, plan_step};

use serde::{Deserialize, Serialize};

/// How a failure affects the outcome of a promotion step.
///
/// The platform transition itself is supply-chain critical: any failure
/// there aborts the step. Evidence submission is deliberately softer — a
/// flaky evidence sink must never block the transition that already
/// happened. The orchestrator aggregates per call site instead of
/// swallowing errors inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Aborts the step and propagates a non-zero exit.
    Fatal,
    /// Logged and reported, but the step still succeeds.
    Advisory,
}

impl Severity {
    /// Whether this severity aborts the step.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Severity::Fatal)
    }
}
