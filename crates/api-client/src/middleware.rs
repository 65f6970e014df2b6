//! Request pipeline stages
//!
//! Every call made through [`crate::ApiClient`] runs the same three stages:
//!
//! 1. [`RequestAuthorizer`] attaches the current bearer token, if any.
//! 2. The request is dispatched over HTTP.
//! 3. [`ResponseMonitor`] inspects the outcome and reports authorization
//!    failures to an [`UnauthorizedHandler`] before handing the outcome back
//!    to the caller unchanged.
//!
//! Both stages are usable on their own so callers with their own transport
//! can compose the same pipeline.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use std::sync::Arc;
use storage::CredentialStore;
use tracing::{debug, info, warn};

use crate::http::{ApiError, ApiRequest, ApiResponse};

/// Receives notice that the server rejected the credential
///
/// Implementations must tolerate overlapping calls: several in-flight
/// requests may fail with 401 at the same time.
#[async_trait]
pub trait UnauthorizedHandler: Send + Sync {
    /// Called once per 401 response, before the error reaches the caller
    async fn on_unauthorized(&self);
}

/// Attaches the stored credential to outgoing requests
#[derive(Clone)]
pub struct RequestAuthorizer {
    credentials: Arc<dyn CredentialStore>,
}

impl RequestAuthorizer {
    /// Create an authorizer reading from the given credential store
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }

    /// Decorate a request with `Authorization: Bearer <token>`
    ///
    /// The store is read on every call, so a token saved after the request
    /// was built is still picked up. If no usable token is available the
    /// request goes out without an `Authorization` header and the server is
    /// left to answer 401. The body is never touched.
    pub async fn authorize(&self, mut request: ApiRequest) -> ApiRequest {
        let token = match self.credentials.read().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, path = %request.path, "Credential store unreadable, sending request unauthenticated");
                None
            }
        };

        let header = token.and_then(|token| {
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| warn!(path = %request.path, "Stored token is not a valid header value"))
                .ok()
        });

        match header {
            Some(mut value) => {
                value.set_sensitive(true);
                request.headers.insert(AUTHORIZATION, value);
            }
            None => {
                request.headers.remove(AUTHORIZATION);
            }
        }

        request
    }
}

/// Watches responses for authorization failures
#[derive(Clone, Default)]
pub struct ResponseMonitor {
    handler: Option<Arc<dyn UnauthorizedHandler>>,
}

impl ResponseMonitor {
    /// Create a monitor that reports 401s to `handler`
    pub fn new(handler: Arc<dyn UnauthorizedHandler>) -> Self {
        Self { handler: Some(handler) }
    }

    /// Create a monitor with no handler; 401s are only logged
    pub fn passive() -> Self {
        Self::default()
    }

    /// Whether a handler is registered
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Inspect an outcome and return it unchanged
    ///
    /// A 401 awaits the handler before returning, so by the time the caller
    /// sees the error the session has already been torn down.
    pub async fn observe<T>(
        &self,
        outcome: Result<ApiResponse<T>, ApiError>,
    ) -> Result<ApiResponse<T>, ApiError> {
        if let Err(ref error) = outcome {
            if error.is_unauthorized() {
                match self.handler {
                    Some(ref handler) => {
                        info!("Server rejected credential, tearing down session");
                        handler.on_unauthorized().await;
                    }
                    None => warn!("Received 401 with no unauthorized handler registered"),
                }
            } else {
                debug!(error = %error, "Request failed");
            }
        }

        outcome
    }
}
