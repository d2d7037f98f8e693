//! Dev-server reverse proxy.
//!
//! DESIGN
//! ======
//! Requests whose path starts with the configured prefix are replayed
//! against the target origin through one shared `reqwest::Client`. Bodies
//! are buffered in both directions; the dev server only fronts a local API,
//! so streaming is not worth the extra plumbing.
//!
//! With `change_origin` set, `Host` and any `Origin` header are rewritten to
//! the target so the backend sees a same-origin request.

use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use http_body_util::LengthLimitError;
use reqwest::Url;

const CONNECT_TIMEOUT_SECS: u64 = 10;
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The upstream could not be reached.
    #[error("upstream connect failed: {0}")]
    Connect(String),

    /// The upstream did not answer within the configured timeout.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    /// The request failed after connecting.
    #[error("upstream request failed: {0}")]
    Request(String),

    /// The request body was over `MAX_BODY_BYTES`.
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The request body stream failed before it was fully read.
    #[error("request body could not be read: {0}")]
    RequestBody(String),

    /// The shared HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ProxyError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Connect(_) | Self::Request(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RequestBody(_) => StatusCode::BAD_REQUEST,
            Self::HttpClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), format!("proxy error: {self}")).into_response()
    }
}

// =============================================================================
// PROXY RULE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRule {
    /// Path prefix, always rooted and without a trailing slash.
    pub prefix: String,
    /// Target origin; path, query and fragment are empty.
    pub target: Url,
    pub change_origin: bool,
    pub strip_prefix: bool,
    pub timeout: Duration,
}

impl ProxyRule {
    /// Plain prefix match: `/api`, `/api/x` and `/apix` all match `/api`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    /// Upstream URL for an incoming `path?query`.
    #[must_use]
    pub fn upstream_url(&self, path_and_query: &str) -> Url {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };

        let path = if self.strip_prefix {
            let rest = path.strip_prefix(self.prefix.as_str()).unwrap_or(path);
            if rest.starts_with('/') { rest.to_string() } else { format!("/{rest}") }
        } else {
            path.to_string()
        };

        let mut url = self.target.clone();
        url.set_path(&path);
        url.set_query(query);
        url
    }

    /// ASCII serialization of the target origin, e.g. `http://localhost:8000`.
    #[must_use]
    pub fn origin(&self) -> String {
        self.target.origin().ascii_serialization()
    }

    /// `host[:port]` of the target, as sent in the `Host` header.
    #[must_use]
    pub fn authority(&self) -> String {
        let host = self.target.host_str().unwrap_or_default();
        match self.target.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    rule: ProxyRule,
}

impl ProxyClient {
    /// # Errors
    ///
    /// Returns `ProxyError::HttpClientBuild` if the TLS backend or client
    /// settings are rejected by reqwest.
    pub fn new(rule: ProxyRule) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder()
            .timeout(rule.timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProxyError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, rule })
    }

    #[must_use]
    pub fn rule(&self) -> &ProxyRule {
        &self.rule
    }

    /// Forward a request upstream and relay the answer.
    ///
    /// # Errors
    ///
    /// Fails when the request body is too large or unreadable, or when the
    /// upstream cannot be reached, times out or breaks off its response.
    /// Upstream error statuses are relayed as responses, not errors.
    pub async fn forward(&self, request: Request) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
        let url = self.rule.upstream_url(path_and_query);

        let body = axum::body::to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
            if hit_length_limit(&e) {
                ProxyError::BodyTooLarge { limit: MAX_BODY_BYTES }
            } else {
                ProxyError::RequestBody(e.to_string())
            }
        })?;

        let headers = self.upstream_headers(parts.headers);
        tracing::debug!(method = %parts.method, %url, "proxying request");

        let upstream = self
            .http
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        let bytes = upstream.bytes().await.map_err(|e| self.classify(e))?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    fn upstream_headers(&self, mut headers: HeaderMap) -> HeaderMap {
        strip_hop_by_hop(&mut headers);
        if !self.rule.change_origin {
            // The client's Host survives as-is.
            return headers;
        }

        headers.remove(header::HOST);
        if let Ok(host) = HeaderValue::from_str(&self.rule.authority()) {
            headers.insert(header::HOST, host);
        }
        if headers.contains_key(header::ORIGIN) {
            if let Ok(origin) = HeaderValue::from_str(&self.rule.origin()) {
                headers.insert(header::ORIGIN, origin);
            }
        }
        headers
    }

    fn classify(&self, err: reqwest::Error) -> ProxyError {
        if err.is_timeout() {
            ProxyError::Timeout(self.rule.timeout)
        } else if err.is_connect() {
            ProxyError::Connect(err.to_string())
        } else {
            ProxyError::Request(err.to_string())
        }
    }
}

fn hit_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in &listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

#[cfg(test)]
#[path = "proxy_test.rs"]
mod tests;
