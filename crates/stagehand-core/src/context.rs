//! # Orchestration Context
//!
//! Immutable per-step inputs and the explicit step report.
//!
//! The context replaces cross-step shared mutable state (environment
//! files) with a value constructed once per invocation. State that must
//! survive between invocations travels through the serialized
//! [`StepReport`] instead of implicit global mutation.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors from context construction and validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A required field was empty.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// The platform base URL is not an HTTP(S) URL.
    #[error("invalid base URL '{0}': expected http:// or https://")]
    InvalidBaseUrl(String),

    /// The debug verbosity level was not recognized.
    #[error("invalid verbosity '{0}': expected none, basic, or verbose")]
    InvalidVerbosity(String),
}

// =============================================================================
// VERBOSITY
// =============================================================================

/// Request debug verbosity for failure-path traces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Emit nothing.
    #[default]
    None,
    /// Method, URL, and header names with credentials redacted.
    Basic,
    /// Basic plus the request body and a reproducible command line.
    Verbose,
}

impl FromStr for Verbosity {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Verbosity::None),
            "basic" => Ok(Verbosity::Basic),
            "verbose" => Ok(Verbosity::Verbose),
            other => Err(ContextError::InvalidVerbosity(other.to_string())),
        }
    }
}

// =============================================================================
// ORCHESTRATION CONTEXT
// =============================================================================

/// Everything one promotion step needs, constructed once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationContext {
    /// Platform base API URL, e.g. `https://host/apptrust/api/v1`.
    pub base_url: String,
    /// Project key used for stage and repository namespacing.
    pub project_key: String,
    /// Application key, e.g. "bookverse-inventory".
    pub application_key: String,
    /// Version identifier being promoted.
    pub version: String,
    /// Requested target stage display name.
    pub target_stage: String,
    /// Whether the terminal release hop is authorized for this invocation.
    pub release_allowed: bool,
    /// Explicit repository keys for the release call; inferred when empty.
    pub repository_keys: Vec<String>,
    /// Evidence provider identity.
    pub provider_id: String,
    /// Evidence signing key alias, when configured.
    pub signing_key_alias: Option<String>,
    /// Commit that triggered the pipeline, when known.
    pub source_commit: Option<String>,
    /// Failure-path trace verbosity.
    pub verbosity: Verbosity,
}

impl OrchestrationContext {
    /// Create a context with the required platform coordinates.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        project_key: impl Into<String>,
        application_key: impl Into<String>,
        version: impl Into<String>,
        target_stage: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            project_key: project_key.into(),
            application_key: application_key.into(),
            version: version.into(),
            target_stage: target_stage.into(),
            release_allowed: false,
            repository_keys: Vec::new(),
            provider_id: "stagehand".to_string(),
            signing_key_alias: None,
            source_commit: None,
            verbosity: Verbosity::None,
        }
    }

    /// Authorize the terminal release hop for this invocation.
    #[must_use]
    pub fn with_release_allowed(mut self, allowed: bool) -> Self {
        self.release_allowed = allowed;
        self
    }

    /// Supply explicit repository keys for the release call.
    #[must_use]
    pub fn with_repository_keys(mut self, keys: Vec<String>) -> Self {
        self.repository_keys = keys;
        self
    }

    /// Set the evidence provider identity.
    #[must_use]
    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = provider_id.into();
        self
    }

    /// Set the evidence signing key alias.
    #[must_use]
    pub fn with_signing_key_alias(mut self, alias: impl Into<String>) -> Self {
        self.signing_key_alias = Some(alias.into());
        self
    }

    /// Set the triggering commit.
    #[must_use]
    pub fn with_source_commit(mut self, commit: impl Into<String>) -> Self {
        self.source_commit = Some(commit.into());
        self
    }

    /// Set the failure-path trace verbosity.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Validate the context before any network call.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] if a required field is empty or the base
    /// URL is not HTTP(S).
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.base_url.is_empty() {
            return Err(ContextError::MissingField("base_url"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ContextError::InvalidBaseUrl(self.base_url.clone()));
        }
        if self.project_key.is_empty() {
            return Err(ContextError::MissingField("project_key"));
        }
        if self.application_key.is_empty() {
            return Err(ContextError::MissingField("application_key"));
        }
        if self.version.is_empty() {
            return Err(ContextError::MissingField("version"));
        }
        if self.target_stage.is_empty() {
            return Err(ContextError::MissingField("target_stage"));
        }
        Ok(())
    }

    /// Service name: the application key with the project prefix stripped.
    #[must_use]
    pub fn service_name(&self) -> &str {
        let prefix = format!("{}-", self.project_key);
        self.application_key
            .strip_prefix(prefix.as_str())
            .unwrap_or(&self.application_key)
    }

    /// Repository keys included in the release call.
    ///
    /// Explicit keys win; otherwise two keys are derived deterministically
    /// from the project and service: docker-release and python-release.
    #[must_use]
    pub fn release_repository_keys(&self) -> Vec<String> {
        if !self.repository_keys.is_empty() {
            return self.repository_keys.clone();
        }
        let service = self.service_name();
        vec![
            format!("{}-{}-docker-release-local", self.project_key, service),
            format!("{}-{}-python-release-local", self.project_key, service),
        ]
    }
}

// =============================================================================
// STEP REPORT
// =============================================================================

/// Explicit cross-invocation state, serialized to a small JSON file.
///
/// Each step appends the stage it entered to the promoted-stage history;
/// the next invocation may load the previous report and merge it rather
/// than mutating any shared environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepReport {
    /// What the step did, e.g. "promoted", "released", "no-op".
    pub action: String,
    /// Platform stage before the step (API form), if assigned.
    pub stage_before: Option<String>,
    /// Platform stage after the step (API form), if assigned.
    pub stage_after: Option<String>,
    /// Display names of every stage entered across invocations.
    pub promoted_stages: Vec<String>,
    /// Advisory failures (evidence submissions) collected this step.
    pub advisories: Vec<String>,
}

impl StepReport {
    /// Create a report for an action.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    /// Record a newly entered stage.
    pub fn record_promotion(&mut self, display_name: impl Into<String>) {
        let name = display_name.into();
        if !self.promoted_stages.contains(&name) {
            self.promoted_stages.push(name);
        }
    }

    /// Merge the promoted-stage history of a previous invocation in front
    /// of this step's entries.
    #[must_use]
    pub fn merged_with(mut self, previous: &StepReport) -> Self {
        let mut merged = previous.promoted_stages.clone();
        for stage in self.promoted_stages.drain(..) {
            if !merged.contains(&stage) {
                merged.push(stage);
            }
        }
        self.promoted_stages = merged;
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
