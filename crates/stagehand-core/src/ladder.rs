//! # Stage Ladder
//!
//! The ordered, named sequence of lifecycle stages and the naming rules
//! between human display names ("QA") and the platform's namespaced API
//! identifiers ("bookverse-QA").
//!
//! Naming invariants:
//! - The terminal stage ("PROD") is never project-prefixed
//! - Every other stage's API identifier is `"<project>-<display>"`
//! - Lookups compare on the API form, so mixed prefixed/unprefixed input
//!   from the platform resolves to the same ladder position

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default promotable stage sequence used when none is configured.
///
/// Versions are born unassigned (conceptually DEV); the ladder lists the
/// stages a version can be promoted *into*, so DEV is not a rung and
/// resolves to the unassigned position.
pub const DEFAULT_STAGES: [&str; 3] = ["QA", "STAGING", "PROD"];

/// Default terminal stage name.
pub const DEFAULT_TERMINAL: &str = "PROD";

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors from ladder construction and stage resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LadderError {
    /// The configured stage list was empty.
    #[error("stage ladder is empty")]
    Empty,

    /// The terminal stage is missing from the configured sequence.
    #[error("terminal stage '{0}' is not in the ladder")]
    TerminalMissing(String),

    /// The terminal stage must be the last rung.
    #[error("terminal stage '{0}' must be the final stage of the ladder")]
    TerminalNotLast(String),

    /// The same display name appeared twice.
    #[error("duplicate stage '{0}' in ladder")]
    DuplicateStage(String),

    /// A requested stage name is not part of the ladder.
    #[error("stage '{0}' is not in the ladder")]
    UnknownStage(String),
}

// =============================================================================
// STAGE
// =============================================================================

/// One rung of the ladder.
///
/// Constructed once from configuration; both naming forms are resolved at
/// construction time so no call site ever re-derives them from strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Human display name, e.g. "QA".
    pub display: String,
    /// Platform API identifier, e.g. "bookverse-QA" (or "PROD", unprefixed).
    pub api_name: String,
    /// Position in the ladder, strictly increasing from zero.
    pub order: usize,
}

impl Stage {
    fn new(display: &str, api_name: String, order: usize) -> Self {
        Self {
            display: display.to_string(),
            api_name,
            order,
        }
    }
}

// =============================================================================
// STAGE LADDER
// =============================================================================

/// The ordered stage sequence for one project.
///
/// Owns the bidirectional display/API mapping. The terminal stage is the
/// final rung and the only one whose API identifier equals its display
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLadder {
    project_key: String,
    terminal: Stage,
    stages: Vec<Stage>,
}

impl StageLadder {
    /// Build a ladder from an ordered list of display names.
    ///
    /// # Errors
    ///
    /// Returns [`LadderError`] if the list is empty, contains duplicates,
    /// or the terminal stage is missing or not last.
    pub fn new(
        project_key: impl Into<String>,
        display_names: &[String],
        terminal: impl Into<String>,
    ) -> Result<Self, LadderError> {
        let project_key = project_key.into();
        let terminal = terminal.into();

        if display_names.is_empty() {
            return Err(LadderError::Empty);
        }
        if !display_names.iter().any(|n| *n == terminal) {
            return Err(LadderError::TerminalMissing(terminal));
        }
        if display_names.last().map(String::as_str) != Some(terminal.as_str()) {
            return Err(LadderError::TerminalNotLast(terminal));
        }

        let mut stages: Vec<Stage> = Vec::with_capacity(display_names.len());
        for (order, name) in display_names.iter().enumerate() {
            if stages.iter().any(|s| s.display == *name) {
                return Err(LadderError::DuplicateStage(name.clone()));
            }
            let api_name = api_name_with(&project_key, &terminal, name);
            stages.push(Stage::new(name, api_name, order));
        }

        let terminal = Stage::new(&terminal, terminal.clone(), stages.len() - 1);
        Ok(Self {
            project_key,
            terminal,
            stages,
        })
    }

    /// Build the default QA → STAGING → PROD ladder.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the default sequence satisfies every
    /// construction invariant.
    pub fn with_defaults(project_key: impl Into<String>) -> Result<Self, LadderError> {
        let names: Vec<String> = DEFAULT_STAGES.iter().map(|s| (*s).to_string()).collect();
        Self::new(project_key, &names, DEFAULT_TERMINAL)
    }

    /// The project key used for API-name prefixing.
    #[must_use]
    pub fn project_key(&self) -> &str {
        &self.project_key
    }

    /// Number of rungs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the ladder has no rungs (unreachable after construction).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// All rungs in order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The stage at a ladder position.
    #[must_use]
    pub fn stage_at(&self, order: usize) -> Option<&Stage> {
        self.stages.get(order)
    }

    /// The terminal (final) stage.
    #[must_use]
    pub fn terminal(&self) -> &Stage {
        &self.terminal
    }

    /// Whether a stage is the terminal rung.
    #[must_use]
    pub fn is_terminal(&self, stage: &Stage) -> bool {
        stage.display == self.terminal.display
    }

    /// Map a display name to its platform API identifier.
    ///
    /// The terminal stage passes through unprefixed; already-prefixed input
    /// passes through unchanged; anything else gains the project prefix.
    #[must_use]
    pub fn api_name_for(&self, display: &str) -> String {
        api_name_with(&self.project_key, &self.terminal.display, display)
    }

    /// Map a platform API identifier back to its display name.
    ///
    /// Strict inverse of [`api_name_for`](Self::api_name_for): strips the
    /// project prefix unless the value is the terminal stage in either
    /// form.
    #[must_use]
    pub fn display_name_for(&self, api_name: &str) -> String {
        let prefixed_terminal = format!("{}-{}", self.project_key, self.terminal.display);
        if api_name == self.terminal.display || api_name == prefixed_terminal {
            return self.terminal.display.clone();
        }
        let prefix = format!("{}-", self.project_key);
        api_name
            .strip_prefix(&prefix)
            .unwrap_or(api_name)
            .to_string()
    }

    /// Ladder position of a stage name, or `None` if unassigned/unknown.
    ///
    /// Accepts either naming form; input is normalized to the API form so
    /// mixed prefixed/unprefixed values from the platform (including a
    /// prefixed terminal) resolve consistently.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        let api = self.api_name_for(&self.display_name_for(name));
        self.stages.iter().position(|s| s.api_name == api)
    }

    /// Resolve a stage by either naming form.
    ///
    /// # Errors
    ///
    /// Returns [`LadderError::UnknownStage`] if the name is not a rung.
    pub fn resolve(&self, name: &str) -> Result<&Stage, LadderError> {
        self.index_of(name)
            .and_then(|i| self.stages.get(i))
            .ok_or_else(|| LadderError::UnknownStage(name.to_string()))
    }
}

/// Shared naming rule for construction and lookups.
fn api_name_with(project_key: &str, terminal: &str, display: &str) -> String {
    if display == terminal {
        return terminal.to_string();
    }
    let prefix = format!("{}-", project_key);
    if display.starts_with(&prefix) {
        return display.to_string();
    }
    format!("{}-{}", project_key, display)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    fn ladder() -> StageLadder {
        StageLadder::with_defaults("bookverse").unwrap()
    }

    #[test]
    fn default_ladder_shape() {
        let l = ladder();
        assert_eq!(l.len(), 3);
        assert_eq!(l.terminal().display, "PROD");
        assert_eq!(l.terminal().order, 2);
    }

    #[test]
    fn api_name_prefixes_non_terminal() {
        let l = ladder();
        assert_eq!(l.api_name_for("QA"), "bookverse-QA");
        assert_eq!(l.api_name_for("STAGING"), "bookverse-STAGING");
    }

    #[test]
    fn api_name_terminal_unprefixed() {
        let l = ladder();
        assert_eq!(l.api_name_for("PROD"), "PROD");
    }

    #[test]
    fn api_name_passes_through_prefixed_input() {
        let l = ladder();
        assert_eq!(l.api_name_for("bookverse-QA"), "bookverse-QA");
    }

    #[test]
    fn display_name_strips_prefix() {
        let l = ladder();
        assert_eq!(l.display_name_for("bookverse-QA"), "QA");
        assert_eq!(l.display_name_for("QA"), "QA");
    }

    #[test]
    fn display_name_terminal_both_forms() {
        let l = ladder();
        assert_eq!(l.display_name_for("PROD"), "PROD");
        assert_eq!(l.display_name_for("bookverse-PROD"), "PROD");
    }

    #[test]
    fn round_trips_hold_for_every_rung() {
        let l = ladder();
        for stage in l.stages() {
            assert_eq!(l.api_name_for(&l.display_name_for(&stage.api_name)), stage.api_name);
            assert_eq!(l.display_name_for(&l.api_name_for(&stage.display)), stage.display);
        }
    }

    #[test]
    fn index_of_accepts_both_forms() {
        let l = ladder();
        assert_eq!(l.index_of("QA"), Some(0));
        assert_eq!(l.index_of("bookverse-QA"), Some(0));
        assert_eq!(l.index_of("PROD"), Some(2));
        // A prefixed terminal from the platform still resolves.
        assert_eq!(l.index_of("bookverse-PROD"), Some(2));
    }

    #[test]
    fn index_of_unknown_is_none() {
        let l = ladder();
        assert_eq!(l.index_of("CANARY"), None);
        assert_eq!(l.index_of("UNASSIGNED"), None);
        // DEV is the pre-stage-zero birth state, not a promotable rung.
        assert_eq!(l.index_of("DEV"), None);
    }

    #[test]
    fn resolve_unknown_is_config_error() {
        let l = ladder();
        let err = l.resolve("CANARY").unwrap_err();
        assert_eq!(err, LadderError::UnknownStage("CANARY".to_string()));
    }

    #[test]
    fn empty_ladder_rejected() {
        let err = StageLadder::new("p", &[], "PROD").unwrap_err();
        assert_eq!(err, LadderError::Empty);
    }

    #[test]
    fn terminal_must_be_present() {
        let names = vec!["DEV".to_string(), "QA".to_string()];
        let err = StageLadder::new("p", &names, "PROD").unwrap_err();
        assert_eq!(err, LadderError::TerminalMissing("PROD".to_string()));
    }

    #[test]
    fn terminal_must_be_last() {
        let names = vec!["PROD".to_string(), "DEV".to_string()];
        let err = StageLadder::new("p", &names, "PROD").unwrap_err();
        assert_eq!(err, LadderError::TerminalNotLast("PROD".to_string()));
    }

    #[test]
    fn duplicate_stage_rejected() {
        let names = vec!["DEV".to_string(), "DEV".to_string(), "PROD".to_string()];
        let err = StageLadder::new("p", &names, "PROD").unwrap_err();
        assert_eq!(err, LadderError::DuplicateStage("DEV".to_string()));
    }

    #[test]
    fn orders_are_strictly_increasing() {
        let l = ladder();
        for (i, stage) in l.stages().iter().enumerate() {
            assert_eq!(stage.order, i);
        }
    }
}
