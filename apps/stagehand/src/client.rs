//! # Platform Client
//!
//! HTTP client for the application-lifecycle platform.
//!
//! One client instance serves one promotion step. Calls are awaited
//! strictly sequentially by the orchestrator; there is no retry and no
//! client-side locking — the platform is the sole arbiter of a version's
//! stage. Any non-2xx response or transport failure surfaces as
//! [`ClientError`] with the URL and body verbatim, plus a redacted
//! request trace at the configured verbosity.

use crate::trace::RequestTrace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stagehand_core::Verbosity;
use thiserror::Error;

/// Default request timeout.
const TIMEOUT_SECONDS: u64 = 30;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors from platform calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// The request never produced an HTTP response.
    #[error("transport failure calling {url}: {source}")]
    Transport {
        /// Request URL.
        url: String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The platform answered with a non-2xx status.
    #[error("platform returned HTTP {status} for {url}: {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
        /// Response body, verbatim.
        body: String,
    },

    /// A 2xx response body could not be decoded.
    #[error("invalid response body from {url}: {source}")]
    Decode {
        /// Request URL.
        url: String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// A version's current position on the platform.
///
/// Read fresh before every transition decision and never cached across
/// steps. The platform may return partial content for unassigned
/// versions, so missing fields read as `None` rather than protocol
/// errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStatus {
    /// Current stage in the platform's API form, if assigned.
    #[serde(default)]
    pub current_stage: Option<String>,
    /// Release status, e.g. "RELEASED", if known.
    #[serde(default)]
    pub release_status: Option<String>,
}

impl VersionStatus {
    /// Whether the version has not yet entered any stage.
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        match self.current_stage.as_deref() {
            None | Some("") => true,
            Some(stage) => stage.eq_ignore_ascii_case("UNASSIGNED"),
        }
    }
}

/// One entry of the platform's version listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    /// Version string.
    pub version: String,
    /// Operator tag, e.g. "latest" or "quarantine".
    #[serde(default)]
    pub tag: Option<String>,
    /// Release status, e.g. "RELEASED" or "TRUSTED_RELEASE".
    #[serde(default)]
    pub release_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VersionList {
    #[serde(default)]
    versions: Vec<VersionSummary>,
}

/// Body of a non-terminal promote call. Constructed per hop, discarded
/// after the call.
#[derive(Debug, Clone, Serialize)]
pub struct PromotionRequest {
    /// Target stage in API form.
    pub target_stage: String,
    /// Always "move" for stage promotion.
    pub promotion_type: String,
}

impl PromotionRequest {
    /// A move-promotion to the given API stage.
    #[must_use]
    pub fn move_to(target_api_stage: impl Into<String>) -> Self {
        Self {
            target_stage: target_api_stage.into(),
            promotion_type: "move".to_string(),
        }
    }
}

/// Body of the terminal release call.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseRequest {
    /// "move" or "copy".
    pub promotion_type: String,
    /// Repository keys scoped into the release.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub included_repository_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RollbackRequest<'a> {
    from_stage: &'a str,
}

#[derive(Debug, Serialize)]
struct EvidenceRequest<'a> {
    predicate_type: &'a str,
    predicate: &'a Value,
    project: &'a str,
    provider_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_alias: Option<&'a str>,
}

// =============================================================================
// CLIENT
// =============================================================================

/// HTTP client for the lifecycle platform.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    base_url: String,
    project_key: String,
    verbosity: Verbosity,
    http: reqwest::Client,
}

impl PlatformClient {
    /// Create a client with bearer authentication and a request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Build`] if the token contains invalid
    /// header characters or the HTTP client fails to build.
    pub fn new(
        base_url: impl Into<String>,
        project_key: impl Into<String>,
        token: &str,
        verbosity: Verbosity,
    ) -> Result<Self, ClientError> {
        use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ClientError::Build(format!("invalid bearer token: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(TIMEOUT_SECONDS))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_key: project_key.into(),
            verbosity,
            http,
        })
    }

    /// The configured base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch a version's current stage and release status.
    ///
    /// # Errors
    ///
    /// Any non-2xx response or transport failure is fatal to the step; no
    /// retry is attempted.
    pub async fn fetch_status(
        &self,
        application_key: &str,
        version: &str,
    ) -> Result<VersionStatus, ClientError> {
        let url = format!(
            "{}/applications/{}/versions/{}/content",
            self.base_url, application_key, version
        );
        let trace = RequestTrace::new("GET", &url).with_project_scope(&self.project_key);
        let resp = self
            .http
            .get(&url)
            .header(crate::trace::PROJECT_HEADER, &self.project_key)
            .send()
            .await
            .map_err(|e| self.transport(&url, &trace, e))?;
        let resp = self.ensure_success(resp, &url, &trace).await?;
        resp.json().await.map_err(|e| ClientError::Decode {
            url: url.clone(),
            source: e,
        })
    }

    /// List an application's versions, newest first by creation time.
    ///
    /// # Errors
    ///
    /// Fails on any non-2xx response or transport failure.
    pub async fn list_versions(
        &self,
        application_key: &str,
    ) -> Result<Vec<VersionSummary>, ClientError> {
        let url = format!(
            "{}/applications/{}/versions?limit=1000&order_by=created&order_asc=false",
            self.base_url, application_key
        );
        let trace = RequestTrace::new("GET", &url).with_project_scope(&self.project_key);
        let resp = self
            .http
            .get(&url)
            .header(crate::trace::PROJECT_HEADER, &self.project_key)
            .send()
            .await
            .map_err(|e| self.transport(&url, &trace, e))?;
        let resp = self.ensure_success(resp, &url, &trace).await?;
        let list: VersionList = resp.json().await.map_err(|e| ClientError::Decode {
            url: url.clone(),
            source: e,
        })?;
        Ok(list.versions)
    }

    /// Issue a non-terminal promote call.
    ///
    /// The platform rejects the project-scope header on this path, so the
    /// request carries none.
    ///
    /// # Errors
    ///
    /// A non-2xx response is a hard failure carrying the status and body
    /// verbatim.
    pub async fn promote(
        &self,
        application_key: &str,
        version: &str,
        request: &PromotionRequest,
    ) -> Result<(), ClientError> {
        let url = format!(
            "{}/applications/{}/versions/{}/promote?async=false",
            self.base_url, application_key, version
        );
        self.post_mutation(&url, request).await
    }

    /// Issue the terminal release call.
    ///
    /// # Errors
    ///
    /// A non-2xx response is a hard failure carrying the status and body
    /// verbatim.
    pub async fn release(
        &self,
        application_key: &str,
        version: &str,
        request: &ReleaseRequest,
    ) -> Result<(), ClientError> {
        let url = format!(
            "{}/applications/{}/versions/{}/release?async=false",
            self.base_url, application_key, version
        );
        self.post_mutation(&url, request).await
    }

    /// Roll a version back out of its current stage.
    ///
    /// # Errors
    ///
    /// Fails on any non-2xx response or transport failure.
    pub async fn rollback(
        &self,
        application_key: &str,
        version: &str,
        from_stage: &str,
    ) -> Result<(), ClientError> {
        let url = format!(
            "{}/applications/{}/versions/{}/rollback",
            self.base_url, application_key, version
        );
        self.post_mutation(&url, &RollbackRequest { from_stage }).await
    }

    /// Attach an evidence predicate to a version.
    ///
    /// # Errors
    ///
    /// Fails on any non-2xx response or transport failure. Callers treat
    /// this as advisory; the promotion itself already succeeded.
    pub async fn create_evidence(
        &self,
        application_key: &str,
        version: &str,
        predicate_type: &str,
        predicate: &Value,
        provider_id: &str,
        key_alias: Option<&str>,
    ) -> Result<(), ClientError> {
        let url = format!(
            "{}/applications/{}/versions/{}/evidence",
            self.base_url, application_key, version
        );
        let request = EvidenceRequest {
            predicate_type,
            predicate,
            project: &self.project_key,
            provider_id,
            key_alias,
        };
        let body = serde_json::to_value(&request).unwrap_or(Value::Null);
        let trace = RequestTrace::new("POST", &url)
            .with_body(&body)
            .with_project_scope(&self.project_key);
        let resp = self
            .http
            .post(&url)
            .header(crate::trace::PROJECT_HEADER, &self.project_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport(&url, &trace, e))?;
        self.ensure_success(resp, &url, &trace).await?;
        Ok(())
    }

    /// POST a promote/release/rollback body. These paths reject the
    /// project-scope header.
    async fn post_mutation<T: Serialize>(&self, url: &str, request: &T) -> Result<(), ClientError> {
        let body = serde_json::to_value(request).unwrap_or(Value::Null);
        let trace = RequestTrace::new("POST", url).with_body(&body);
        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport(url, &trace, e))?;
        self.ensure_success(resp, url, &trace).await?;
        Ok(())
    }

    /// Map a transport failure, emitting the redacted trace.
    fn transport(&self, url: &str, trace: &RequestTrace<'_>, source: reqwest::Error) -> ClientError {
        self.emit_trace(trace);
        ClientError::Transport {
            url: url.to_string(),
            source,
        }
    }

    /// Convert non-2xx responses into [`ClientError::Upstream`], emitting
    /// the redacted trace.
    async fn ensure_success(
        &self,
        resp: reqwest::Response,
        url: &str,
        trace: &RequestTrace<'_>,
    ) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        self.emit_trace(trace);
        let body = resp.text().await.unwrap_or_default();
        Err(ClientError::Upstream {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        })
    }

    fn emit_trace(&self, trace: &RequestTrace<'_>) {
        if let Some(rendered) = trace.render(self.verbosity) {
            tracing::error!("{rendered}");
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn status_missing_fields_read_as_unknown() {
        let status: VersionStatus = serde_json::from_str("{}").unwrap();
        assert!(status.current_stage.is_none());
        assert!(status.release_status.is_none());
        assert!(status.is_unassigned());
    }

    #[test]
    fn status_unassigned_marker_recognized() {
        let status = VersionStatus {
            current_stage: Some("UNASSIGNED".to_string()),
            release_status: None,
        };
        assert!(status.is_unassigned());
    }

    #[test]
    fn status_assigned_stage_is_not_unassigned() {
        let status = VersionStatus {
            current_stage: Some("bookverse-QA".to_string()),
            release_status: Some("NOT_RELEASED".to_string()),
        };
        assert!(!status.is_unassigned());
    }

    #[test]
    fn promotion_request_is_always_move() {
        let req = PromotionRequest::move_to("bookverse-QA");
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"target_stage\":\"bookverse-QA\""));
        assert!(json.contains("\"promotion_type\":\"move\""));
    }

    #[test]
    fn release_request_omits_empty_repository_keys() {
        let req = ReleaseRequest {
            promotion_type: "move".to_string(),
            included_repository_keys: Vec::new(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("included_repository_keys"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client =
            PlatformClient::new("https://host/api/v1/", "p", "tok", Verbosity::None).unwrap();
        assert_eq!(client.base_url(), "https://host/api/v1");
    }

    #[test]
    fn invalid_token_fails_to_build() {
        let err = PlatformClient::new("https://host", "p", "bad\ntoken", Verbosity::None)
            .unwrap_err();
        assert!(matches!(err, ClientError::Build(_)));
    }

    #[test]
    fn version_list_defaults_to_empty() {
        let list: VersionList = serde_json::from_str("{}").unwrap();
        assert!(list.versions.is_empty());
    }
}
