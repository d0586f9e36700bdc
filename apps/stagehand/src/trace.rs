//! # Request Debug Tracer
//!
//! Renders reproducible, redacted request traces for operator diagnosis.
//!
//! Invoked only on the failure path of platform calls. The bearer
//! credential is always redacted; the project-scope header appears only
//! for endpoints that accept it (the platform rejects it on promote and
//! release paths). Verbose traces add the request body and an equivalent
//! curl command line that can be replayed with a real token.

use serde_json::Value;
use stagehand_core::Verbosity;

/// Placeholder for the redacted bearer credential.
pub const REDACTED_BEARER: &str = "Bearer ***";

/// Project-scope header name for endpoints that accept it.
pub const PROJECT_HEADER: &str = "X-Project-Key";

/// A single platform request, captured for failure-path rendering.
#[derive(Debug, Clone)]
pub struct RequestTrace<'a> {
    /// HTTP method, e.g. "POST".
    pub method: &'a str,
    /// Full request URL.
    pub url: &'a str,
    /// JSON body, when the request had one.
    pub body: Option<&'a Value>,
    /// Project key, only for endpoints that accept the scope header.
    pub project_scope: Option<&'a str>,
}

impl<'a> RequestTrace<'a> {
    /// Capture a request for tracing.
    #[must_use]
    pub fn new(method: &'a str, url: &'a str) -> Self {
        Self {
            method,
            url,
            body: None,
            project_scope: None,
        }
    }

    /// Attach the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: &'a Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach the project scope header (non-promote/non-release only).
    #[must_use]
    pub fn with_project_scope(mut self, project_key: &'a str) -> Self {
        self.project_scope = Some(project_key);
        self
    }

    /// Header names and (redacted) values this request carries.
    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Authorization", REDACTED_BEARER.to_string()),
            ("Accept", "application/json".to_string()),
        ];
        if self.body.is_some() {
            headers.push(("Content-Type", "application/json".to_string()));
        }
        if let Some(project) = self.project_scope {
            headers.push((PROJECT_HEADER, project.to_string()));
        }
        headers
    }

    /// Render the trace at the given verbosity.
    ///
    /// `None` verbosity emits nothing. `Basic` prints method, URL, and
    /// header names with the credential redacted. `Verbose` adds the body
    /// and a reproducible curl line.
    #[must_use]
    pub fn render(&self, verbosity: Verbosity) -> Option<String> {
        match verbosity {
            Verbosity::None => None,
            Verbosity::Basic => Some(self.render_basic()),
            Verbosity::Verbose => Some(self.render_verbose()),
        }
    }

    fn render_basic(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("request: {} {}\n", self.method, self.url));
        let names: Vec<&str> = self.headers().iter().map(|(n, _)| *n).collect();
        out.push_str(&format!("headers: {}\n", names.join(", ")));
        out.push_str(&format!("authorization: {}\n", REDACTED_BEARER));
        out
    }

    fn render_verbose(&self) -> String {
        let mut out = self.render_basic();
        if let Some(body) = self.body {
            let rendered =
                serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
            out.push_str(&format!("body: {}\n", rendered));
        }
        out.push_str(&format!("replay: {}\n", self.curl_line()));
        out
    }

    /// A reproducible equivalent command line, credential redacted.
    #[must_use]
    pub fn curl_line(&self) -> String {
        let mut line = format!("curl -X {} '{}'", self.method, self.url);
        for (name, value) in self.headers() {
            line.push_str(&format!(" -H '{}: {}'", name, value));
        }
        if let Some(body) = self.body {
            line.push_str(&format!(" -d '{}'", body));
        }
        line
    }
}

// =============================================================================
// TESTS
// =============================================================================
