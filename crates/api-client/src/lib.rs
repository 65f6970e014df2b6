//! Finance API Client Library
//!
//! HTTP client for the personal finance API. Every request runs through the
//! same pipeline: the stored bearer token is attached, the request is sent,
//! and a 401 response is reported to an [`UnauthorizedHandler`] before the
//! error is returned to the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod endpoints;
pub mod http;
pub mod middleware;
pub mod types;

pub use client::ApiClient;
pub use endpoints::FinanceApi;
pub use http::{ApiClientConfig, ApiError, ApiRequest, ApiResponse, HttpMethod};
pub use middleware::{RequestAuthorizer, ResponseMonitor, UnauthorizedHandler};

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
