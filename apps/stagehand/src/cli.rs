//! # Stagehand CLI
//!
//! Command-line interface for the promotion orchestrator.
//!
//! ## Commands
//!
//! - `stagehand advance` - advance the version one hop toward the target
//! - `stagehand status` - show the version's current stage
//! - `stagehand rollback` - roll the version back out of its current stage
//!
//! Every platform input is also readable from the environment so CI jobs
//! can configure the tool without long argument lists. Exit codes: 0 for
//! success or no-op, 1 for platform failures, 2 for configuration errors.

use crate::client::{ClientError, PlatformClient, VersionStatus, VersionSummary};
use crate::orchestrator::{StepError, StepOutcome, advance_one_step};
use clap::{Args, Parser, Subcommand};
use semver::Version;
use stagehand_core::context::{OrchestrationContext, StepReport, Verbosity};
use stagehand_core::ladder::StageLadder;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Release statuses that qualify a version as a rollback candidate.
const RELEASED: &str = "RELEASED";
const TRUSTED_RELEASE: &str = "TRUSTED_RELEASE";

/// Tag marking versions that must never be offered as candidates.
const QUARANTINE_TAG: &str = "quarantine";

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Stagehand — promote application versions through lifecycle stages.
#[derive(Debug, Parser)]
#[command(name = "stagehand")]
pub struct Cli {
    #[command(flatten)]
    pub platform: PlatformArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Platform coordinates shared by every command.
#[derive(Debug, Args)]
pub struct PlatformArgs {
    /// Base API URL, e.g. https://host/lifecycle/api/v1
    #[arg(long, env = "APPTRUST_BASE_URL")]
    pub base_url: String,

    /// Bearer access token
    #[arg(long, env = "APPTRUST_ACCESS_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Project key for stage and repository namespacing
    #[arg(long, env = "STAGEHAND_PROJECT_KEY")]
    pub project: String,

    /// Application key, e.g. bookverse-inventory
    #[arg(long, env = "STAGEHAND_APPLICATION_KEY")]
    pub app: String,

    /// Version to operate on
    #[arg(long, env = "STAGEHAND_VERSION")]
    pub version: String,

    /// Ordered promotable stage display names, terminal last. Versions
    /// are born unassigned (DEV), so DEV is not listed.
    #[arg(
        long,
        env = "STAGEHAND_STAGES",
        default_value = "QA,STAGING,PROD",
        value_delimiter = ','
    )]
    pub stages: Vec<String>,

    /// Terminal stage display name
    #[arg(long, env = "STAGEHAND_TERMINAL_STAGE", default_value = "PROD")]
    pub terminal_stage: String,

    /// Failure-path request trace verbosity: none, basic, verbose
    #[arg(long, env = "STAGEHAND_DEBUG", default_value = "none")]
    pub debug: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Advance the version one hop toward the target stage
    ///
    /// Idempotent: re-running after the target is reached is a successful
    /// no-op, and each run advances at most one stage so no evidence gate
    /// is skipped.
    Advance(AdvanceArgs),

    /// Show the version's current stage and release status
    Status,

    /// Roll the version back out of its current stage
    Rollback(RollbackArgs),
}

#[derive(Debug, Args)]
pub struct AdvanceArgs {
    /// Target stage display name
    #[arg(long, env = "STAGEHAND_TARGET_STAGE")]
    pub target: String,

    /// Authorize the terminal release hop for this invocation
    #[arg(long, env = "STAGEHAND_RELEASE_ALLOWED")]
    pub allow_release: bool,

    /// Explicit repository key for the release call (repeatable; inferred
    /// from project and application when omitted)
    #[arg(long = "repository-key")]
    pub repository_keys: Vec<String>,

    /// Evidence provider identity
    #[arg(long, default_value = "stagehand")]
    pub provider_id: String,

    /// Evidence signing key alias
    #[arg(long)]
    pub signing_key: Option<String>,

    /// Commit that triggered the pipeline (recorded in PROD evidence)
    #[arg(long, env = "STAGEHAND_SOURCE_COMMIT")]
    pub source_commit: Option<String>,

    /// Write the step report JSON here, merging any previous report's
    /// promoted-stage history
    #[arg(long)]
    pub report_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RollbackArgs {
    /// List rollback candidates (newest first) instead of rolling back
    #[arg(long)]
    pub list_candidates: bool,
}

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors from the rollback command.
#[derive(Debug, Error)]
pub enum RollbackError {
    /// Rollback is not applicable before the version enters a stage.
    #[error("cannot rollback a version in UNASSIGNED or unknown stage")]
    Unassigned,

    /// A platform call failed.
    #[error(transparent)]
    Upstream(#[from] ClientError),
}

// =============================================================================
// ENTRY POINT
// =============================================================================

impl Cli {
    /// Run the selected command, returning the process exit code.
    pub async fn run(self) -> u8 {
        let verbosity: Verbosity = match self.platform.debug.parse() {
            Ok(v) => v,
            Err(err) => {
                eprintln!("ERROR: {err}");
                return 2;
            }
        };

        let ladder = match StageLadder::new(
            &self.platform.project,
            &self.platform.stages,
            &self.platform.terminal_stage,
        ) {
            Ok(ladder) => ladder,
            Err(err) => {
                eprintln!("ERROR: {err}");
                return 2;
            }
        };

        let client = match PlatformClient::new(
            &self.platform.base_url,
            &self.platform.project,
            &self.platform.token,
            verbosity,
        ) {
            Ok(client) => client,
            Err(err) => {
                eprintln!("ERROR: {err}");
                return 2;
            }
        };

        match self.command {
            Command::Advance(args) => {
                let ctx = OrchestrationContext::new(
                    &self.platform.base_url,
                    &self.platform.project,
                    &self.platform.app,
                    &self.platform.version,
                    &args.target,
                )
                .with_release_allowed(args.allow_release)
                .with_repository_keys(args.repository_keys.clone())
                .with_provider_id(&args.provider_id)
                .with_verbosity(verbosity);
                let ctx = match &args.signing_key {
                    Some(alias) => ctx.with_signing_key_alias(alias),
                    None => ctx,
                };
                let ctx = match &args.source_commit {
                    Some(commit) => ctx.with_source_commit(commit),
                    None => ctx,
                };

                match cmd_advance(&client, &ladder, &ctx, args.report_file.as_deref()).await {
                    Ok(_) => 0,
                    Err(StepError::Config(err)) => {
                        eprintln!("ERROR: {err}");
                        2
                    }
                    Err(err) => {
                        eprintln!("ERROR: {err}");
                        1
                    }
                }
            }
            Command::Status => {
                match cmd_status(&client, &self.platform.app, &self.platform.version).await {
                    Ok(_) => 0,
                    Err(err) => {
                        eprintln!("ERROR: {err}");
                        1
                    }
                }
            }
            Command::Rollback(args) => {
                let result = if args.list_candidates {
                    cmd_rollback_candidates(&client, &self.platform.app)
                        .await
                        .map(|_| ())
                } else {
                    cmd_rollback(&client, &self.platform.app, &self.platform.version).await
                };
                match result {
                    Ok(()) => 0,
                    Err(err) => {
                        eprintln!("ERROR: {err}");
                        1
                    }
                }
            }
        }
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Execute one promotion step and optionally persist the step report.
///
/// # Errors
///
/// Propagates [`StepError`] from the orchestrator; report-file write
/// failures are advisory and logged, matching the evidence asymmetry.
pub async fn cmd_advance(
    client: &PlatformClient,
    ladder: &StageLadder,
    ctx: &OrchestrationContext,
    report_file: Option<&Path>,
) -> Result<StepOutcome, StepError> {
    let outcome = advance_one_step(client, ladder, ctx).await?;

    if let Some(path) = report_file {
        let report = outcome.report();
        let report = match load_report(path) {
            Some(previous) => report.merged_with(&previous),
            None => report,
        };
        if let Err(err) = write_report(path, &report) {
            tracing::warn!("failed to write step report {}: {err}", path.display());
        }
    }

    Ok(outcome)
}

/// Print a version's current stage and release status.
///
/// # Errors
///
/// Fails when the status read fails.
pub async fn cmd_status(
    client: &PlatformClient,
    application_key: &str,
    version: &str,
) -> Result<VersionStatus, ClientError> {
    let status = client.fetch_status(application_key, version).await?;
    let stage = status.current_stage.as_deref().unwrap_or("UNASSIGNED");
    let release = status.release_status.as_deref().unwrap_or("unknown");
    println!("{application_key}@{version}: stage={stage} release_status={release}");
    Ok(status)
}

/// Roll a version back out of its current stage.
///
/// Fetches the current stage first and passes it as the rollback origin;
/// fails fast when the version is unassigned.
///
/// # Errors
///
/// Returns [`RollbackError::Unassigned`] before any mutation when the
/// version has no stage, or [`RollbackError::Upstream`] when a platform
/// call fails.
pub async fn cmd_rollback(
    client: &PlatformClient,
    application_key: &str,
    version: &str,
) -> Result<(), RollbackError> {
    let status = client.fetch_status(application_key, version).await?;
    if status.is_unassigned() {
        return Err(RollbackError::Unassigned);
    }
    let from_stage = status.current_stage.unwrap_or_default();

    // Describe the call explicitly without emitting tokens or the
    // absolute base URL.
    println!(
        "Calling endpoint: POST /applications/{application_key}/versions/{version}/rollback with body {{from_stage: {from_stage}}}"
    );
    client
        .rollback(application_key, version, &from_stage)
        .await?;
    println!("Invoked rollback for {application_key}@{version} from {from_stage}");
    Ok(())
}

/// List rollback candidates, newest first by SemVer precedence.
///
/// Candidates are versions whose release status is RELEASED or
/// TRUSTED_RELEASE and whose tag is not "quarantine".
///
/// # Errors
///
/// Fails when the version listing fails.
pub async fn cmd_rollback_candidates(
    client: &PlatformClient,
    application_key: &str,
) -> Result<Vec<VersionSummary>, RollbackError> {
    let versions = client.list_versions(application_key).await?;
    let candidates = rollback_candidates(versions);
    if candidates.is_empty() {
        println!("{application_key}: no rollback candidates");
    }
    for candidate in &candidates {
        let release = candidate.release_status.as_deref().unwrap_or("unknown");
        let tag = candidate.tag.as_deref().unwrap_or("-");
        println!("{}  {}  tag={}", candidate.version, release, tag);
    }
    Ok(candidates)
}

// =============================================================================
// HELPERS
// =============================================================================

/// Filter and order rollback candidates by SemVer precedence, descending.
///
/// Versions that do not parse as SemVer keep their platform listing order
/// after all parseable ones.
fn rollback_candidates(versions: Vec<VersionSummary>) -> Vec<VersionSummary> {
    let mut candidates: Vec<VersionSummary> = versions
        .into_iter()
        .filter(|v| {
            let status = v
                .release_status
                .as_deref()
                .unwrap_or_default()
                .to_ascii_uppercase();
            status == RELEASED || status == TRUSTED_RELEASE
        })
        .filter(|v| v.tag.as_deref() != Some(QUARANTINE_TAG))
        .collect();

    candidates.sort_by(|a, b| {
        match (parse_semver(&a.version), parse_semver(&b.version)) {
            (Some(va), Some(vb)) => vb.cmp(&va),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
    candidates
}

/// Parse a version string as SemVer, tolerating a leading `v` and
/// surrounding whitespace.
fn parse_semver(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

fn load_report(path: &Path) -> Option<StepReport> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(report) => Some(report),
        Err(err) => {
            tracing::warn!("ignoring unreadable step report {}: {err}", path.display());
            None
        }
    }
}

fn write_report(path: &Path, report: &StepReport) -> Result<(), std::io::Error> {
    let rendered = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, rendered)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    fn summary(version: &str, status: &str, tag: Option<&str>) -> VersionSummary {
        VersionSummary {
            version: version.to_string(),
            tag: tag.map(|t| t.to_string()),
            release_status: Some(status.to_string()),
        }
    }

    #[test]
    fn candidates_sorted_by_semver_desc() {
        let candidates = rollback_candidates(vec![
            summary("1.2.3", "RELEASED", None),
            summary("2.0.0", "RELEASED", None),
            summary("1.10.0", "TRUSTED_RELEASE", None),
        ]);
        let order: Vec<&str> = candidates.iter().map(|c| c.version.as_str()).collect();
        assert_eq!(order, vec!["2.0.0", "1.10.0", "1.2.3"]);
    }

    #[test]
    fn prerelease_sorts_below_release() {
        let candidates = rollback_candidates(vec![
            summary("2.0.0-rc.1", "RELEASED", None),
            summary("2.0.0", "RELEASED", None),
        ]);
        let order: Vec<&str> = candidates.iter().map(|c| c.version.as_str()).collect();
        assert_eq!(order, vec!["2.0.0", "2.0.0-rc.1"]);
    }

    #[test]
    fn quarantined_versions_excluded() {
        let candidates = rollback_candidates(vec![
            summary("1.0.0", "RELEASED", Some("quarantine")),
            summary("0.9.0", "RELEASED", Some("latest")),
        ]);
        let order: Vec<&str> = candidates.iter().map(|c| c.version.as_str()).collect();
        assert_eq!(order, vec!["0.9.0"]);
    }

    #[test]
    fn non_release_statuses_excluded() {
        let candidates = rollback_candidates(vec![
            summary("1.0.0", "NOT_RELEASED", None),
            summary("0.9.0", "released", None),
        ]);
        let order: Vec<&str> = candidates.iter().map(|c| c.version.as_str()).collect();
        assert_eq!(order, vec!["0.9.0"]);
    }

    #[test]
    fn unparseable_versions_sort_last() {
        let candidates = rollback_candidates(vec![
            summary("weekly-build", "RELEASED", None),
            summary("1.0.0", "RELEASED", None),
        ]);
        let order: Vec<&str> = candidates.iter().map(|c| c.version.as_str()).collect();
        assert_eq!(order, vec!["1.0.0", "weekly-build"]);
    }

    #[test]
    fn leading_v_versions_parse() {
        let candidates = rollback_candidates(vec![
            summary("v1.2.0", "RELEASED", None),
            summary("1.10.0", "RELEASED", None),
        ]);
        let order: Vec<&str> = candidates.iter().map(|c| c.version.as_str()).collect();
        assert_eq!(order, vec!["1.10.0", "v1.2.0"]);
    }

    #[test]
    fn cli_parses_advance_command() {
        let cli = Cli::try_parse_from([
            "stagehand",
            "--base-url",
            "https://host/api/v1",
            "--token",
            "tok",
            "--project",
            "bookverse",
            "--app",
            "bookverse-inventory",
            "--version",
            "1.2.3",
            "advance",
            "--target",
            "STAGING",
        ])
        .unwrap();
        assert_eq!(cli.platform.stages, vec!["QA", "STAGING", "PROD"]);
        match cli.command {
            Command::Advance(args) => {
                assert_eq!(args.target, "STAGING");
                assert!(!args.allow_release);
            }
            other => panic!("expected Advance, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_custom_stage_list() {
        let cli = Cli::try_parse_from([
            "stagehand",
            "--base-url",
            "https://host/api/v1",
            "--token",
            "tok",
            "--project",
            "p",
            "--app",
            "p-svc",
            "--version",
            "1.0.0",
            "--stages",
            "DEV,CANARY,PROD",
            "status",
        ])
        .unwrap();
        assert_eq!(cli.platform.stages, vec!["DEV", "CANARY", "PROD"]);
    }
}
