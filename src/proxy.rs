// SPDX-License-Identifier: MIT
//! Backend request forwarding.
//!
//! The browser cannot read its own HttpOnly session cookie, so API calls go
//! through this gateway, which runs where the `Cookie` header is visible and
//! reattaches it to the outbound backend request. The backend's response is
//! returned verbatim — status, body, and content-type — with no parsing,
//! mutation, retries, or caching.
//!
//! Exactly two inbound headers cross the boundary: `Content-Type` and
//! `Cookie`. Everything else (authorization headers set by middleware,
//! user-agent, forwarding headers) is dropped. The allow-list is deliberate:
//! the backend needs content negotiation and session identity, nothing more.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

pub const BACKEND_UNREACHABLE_BODY: &str = r#"{"error":"Failed to connect to backend service"}"#;

// ─── Request / response types ─────────────────────────────────────────────────

/// Methods the proxy route accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMethod {
    Get,
    Post,
    Patch,
    Delete,
    Put,
}

impl ProxyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyMethod::Get => "GET",
            ProxyMethod::Post => "POST",
            ProxyMethod::Patch => "PATCH",
            ProxyMethod::Delete => "DELETE",
            ProxyMethod::Put => "PUT",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            ProxyMethod::Get => reqwest::Method::GET,
            ProxyMethod::Post => reqwest::Method::POST,
            ProxyMethod::Patch => reqwest::Method::PATCH,
            ProxyMethod::Delete => reqwest::Method::DELETE,
            ProxyMethod::Put => reqwest::Method::PUT,
        }
    }
}

/// One inbound call, consumed by a single forwarding attempt.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: ProxyMethod,
    /// Raw path segments, forwarded as-is. No decoding, no traversal
    /// sanitization — the backend owns that defense.
    pub segments: Vec<String>,
    /// Raw query string without the leading `?`, passed through unmodified.
    pub query: Option<String>,
    pub content_type: Option<String>,
    /// Opaque session cookie header, copied byte-for-byte when present.
    pub cookie: Option<String>,
    /// Body text for non-GET methods. An empty inbound body is normalised
    /// to `None` before construction: "no body" and "empty string body"
    /// must both result in no body being sent upstream.
    pub body: Option<String>,
}

/// The backend's answer, owned by one request/response cycle.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    /// Raw response text, never parsed as JSON and never mutated.
    pub body: String,
    pub content_type: String,
}

impl ProxyResponse {
    /// The fixed-shape answer for any transport-level failure reaching the
    /// backend. Exception internals stay in the server log.
    pub fn backend_unreachable() -> Self {
        Self {
            status: 503,
            body: BACKEND_UNREACHABLE_BODY.to_string(),
            content_type: "application/json".to_string(),
        }
    }
}

#[derive(Debug, Error)]
enum ForwardError {
    #[error("backend request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

// ─── Forwarder ────────────────────────────────────────────────────────────────

/// Stateless relay to the backend service. One suspension point per call
/// (the backend round trip); no shared mutable state across calls.
pub struct Forwarder {
    client: reqwest::Client,
    base_url: String,
}

impl Forwarder {
    /// `base_url` is injected explicitly (no runtime env lookups) so tests
    /// can substitute a local double. `timeout` of `None` means unbounded
    /// wait: the call fails only on connection-level errors, matching the
    /// contract's default.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into(),
        })
    }

    /// Relay one request and translate transport failures into the fixed
    /// 503 shape. This is the only error translation the gateway performs;
    /// backend 4xx/5xx responses pass through untouched.
    pub async fn forward(&self, request: ProxyRequest) -> ProxyResponse {
        let method = request.method;
        let target = self.target_url(&request.segments, request.query.as_deref());
        match self.try_forward(request, &target).await {
            Ok(resp) => {
                debug!(method = method.as_str(), target = %target, status = resp.status, "forwarded");
                resp
            }
            Err(e) => {
                warn!(method = method.as_str(), target = %target, err = %e, "backend unreachable");
                ProxyResponse::backend_unreachable()
            }
        }
    }

    fn target_url(&self, segments: &[String], query: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.base_url, segments.join("/"));
        if let Some(q) = query {
            url.push('?');
            url.push_str(q);
        }
        url
    }

    async fn try_forward(
        &self,
        request: ProxyRequest,
        target: &str,
    ) -> Result<ProxyResponse, ForwardError> {
        let mut builder = self.client.request(request.method.to_reqwest(), target);
        if let Some(ct) = &request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, ct);
        }
        if let Some(cookie) = &request.cookie {
            builder = builder.header(reqwest::header::COOKIE, cookie);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let body = response.text().await?;

        Ok(ProxyResponse {
            status,
            body,
            content_type,
        })
    }
}
