//! HTTP request and response values exchanged with a [`Transport`].
//!
//! # Design
//! Requests and responses are plain data. The client builds `HttpRequest`
//! values and parses `HttpResponse` values; executing the round trip is the
//! transport's job. Hosts that already own an HTTP stack can skip the bundled
//! transport entirely and drive `build_*` / `parse_*` themselves.
//!
//! [`Transport`]: crate::transport::Transport

use std::time::Duration;

use serde::Serialize;

use crate::error::ApiError;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";
pub const CACHE_CONTROL: &str = "Cache-Control";
pub const APPLICATION_JSON: &str = "application/json";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data.
///
/// Produced by the `CrmClient` request builders. `timeout` comes from the
/// caller's `RequestContext` and, when set, overrides the transport default.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// Set a header, replacing any existing value (names compare
    /// case-insensitively).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(existing) => existing.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn with_bearer_auth(self, token: &str) -> Self {
        self.with_header(AUTHORIZATION, format!("Bearer {token}"))
    }

    /// Serialize `body` as the JSON payload. Adds a JSON content type unless
    /// one was already set.
    pub fn with_json_body<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        let json = serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        if self.header(CONTENT_TYPE).is_none() {
            self.set_header(CONTENT_TYPE, APPLICATION_JSON);
        }
        self.body = Some(json);
        Ok(self)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Statuses of 400 and above count as failures. 1xx/3xx are neither.
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// `"404 Not Found"`, or just the code when the reason is unknown.
    pub fn status_line(&self) -> String {
        match ureq::http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
        {
            Some(reason) => format!("{} {reason}", self.status),
            None => self.status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut req = HttpRequest::new(HttpMethod::Post, "http://localhost/x");
        req.set_header("content-type", "text/plain");
        req.set_header(CONTENT_TYPE, APPLICATION_JSON);
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("CONTENT-TYPE"), Some(APPLICATION_JSON));
    }

    #[test]
    fn json_body_keeps_existing_content_type() {
        let req = HttpRequest::new(HttpMethod::Post, "http://localhost/x")
            .with_header(CONTENT_TYPE, "application/vnd.crm+json")
            .with_json_body(&serde_json::json!({"a": 1}))
            .unwrap();
        assert_eq!(req.header(CONTENT_TYPE), Some("application/vnd.crm+json"));
        assert_eq!(req.body.as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn status_line_includes_reason() {
        let resp = HttpResponse {
            status: 404,
            headers: Vec::new(),
            body: String::new(),
        };
        assert_eq!(resp.status_line(), "404 Not Found");
        assert!(resp.is_error());
        assert!(!resp.is_success());
    }

    #[test]
    fn redirects_are_neither_success_nor_error() {
        let resp = HttpResponse {
            status: 304,
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(!resp.is_error());
        assert!(!resp.is_success());
    }
}
