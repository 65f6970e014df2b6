//! HTTP request/response model
//!
//! This module defines the values that flow through the request pipeline:
//! the outgoing [`ApiRequest`], the decoded [`ApiResponse`], the
//! [`ApiError`] taxonomy, and the client configuration.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Maximum length for error response bodies kept in an [`ApiError`]
const MAX_ERROR_BODY_LENGTH: usize = 500;

// =============================================================================
// Error Types
// =============================================================================

/// Errors surfaced by the API client
///
/// # Examples
/// ```
/// use api_client::http::ApiError;
///
/// let error = ApiError::from_status(401, "");
/// assert!(error.is_unauthorized());
/// assert_eq!(error.status(), Some(401));
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Human-readable message extracted from the body
        message: String,
        /// Raw (truncated) response body
        body: String,
    },

    /// The request did not complete within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection or protocol failure before a response was received
    #[error("Network error: {0}")]
    Transport(String),

    /// A 2xx response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Standard error body returned by the API (`{"detail": "..."}`)
#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

impl ApiError {
    /// Build a status error from a response body
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = truncate_body(body);
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.detail.or(b.message).or(b.error))
            .unwrap_or_else(|| default_reason(status).to_string());

        ApiError::Status { status, message, body }
    }

    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the credential (HTTP 401)
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Whether the failure happened below HTTP (timeout, unreachable host)
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Timeout | ApiError::Transport(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

fn default_reason(status: u16) -> &'static str {
    match status {
        400 => "Bad request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not found",
        429 => "Too many requests",
        500..=599 => "Server error",
        _ => "Unexpected status",
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// HTTP method for API requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// PATCH request
    Patch,
    /// DELETE request
    Delete,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// An outgoing request to the API
///
/// `path` is relative to the configured base URL (e.g. `"goals/"`).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Path relative to the base URL
    pub path: String,
    /// Query parameters, in insertion order
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Option<Vec<u8>>,
    /// Content type of the body
    pub content_type: Option<String>,
}

impl ApiRequest {
    /// Create a request with an arbitrary method
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            content_type: None,
        }
    }

    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Create a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Create a PUT request
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// Create a PATCH request
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    /// Create a DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header, rejecting names or values that are not valid HTTP
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set the request body from JSON
    pub fn json_body<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, ApiError> {
        let body =
            serde_json::to_vec(value).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.body = Some(body);
        self.content_type = Some("application/json".to_string());
        Ok(self)
    }

    /// Current `Authorization` header value, if any
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// A successful (2xx) response with a decoded body
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response data
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Create a new response
    pub fn new(status: u16, headers: HeaderMap, data: T) -> Self {
        Self { status, headers, data }
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Default API location (host loopback as seen from the Android emulator)
pub const DEFAULT_BASE_URL: &str = "http://10.0.2.2:8000/api/";

/// Default upper bound on a single network call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL; request paths are joined onto it
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Headers included in every request
    ///
    /// An `Authorization` entry is ignored; that header comes only from the
    /// credential store.
    pub default_headers: Vec<(String, String)>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("FinanceApp/{}", env!("CARGO_PKG_VERSION")),
            default_headers: Vec::new(),
        }
    }
}

impl ApiClientConfig {
    /// Create a new config with a base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Default::default() }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((key.into(), value.into()));
        self
    }

    /// Resolve a request path against the base URL
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

// =============================================================================
// Tests
// =============================================================================
