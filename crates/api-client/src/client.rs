//! API client
//!
//! [`ApiClient`] runs each call through authorize → dispatch → monitor.
//! Every call is its own sequential pipeline; concurrent calls share only the
//! connection pool, the credential store, and the unauthorized handler.

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, Response as ReqwestResponse};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use storage::CredentialStore;
use tracing::{debug, instrument};

use crate::http::{ApiClientConfig, ApiError, ApiRequest, ApiResponse};
use crate::middleware::{RequestAuthorizer, ResponseMonitor, UnauthorizedHandler};
use crate::Result;

/// HTTP client for the finance API
///
/// Clone is cheap: the underlying reqwest client, credential store and
/// handler are all reference counted.
///
/// # Examples
/// ```no_run
/// use api_client::{ApiClient, ApiClientConfig};
/// use std::sync::Arc;
/// use storage::KvCredentialStore;
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Arc::new(KvCredentialStore::in_memory()?);
///     let client = ApiClient::new(ApiClientConfig::new("http://localhost:8000/api/"), store)?;
///
///     let score: serde_json::Value = client.get("score/").await?;
///     println!("{score}");
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    client: ReqwestClient,
    config: ApiClientConfig,
    authorizer: RequestAuthorizer,
    monitor: ResponseMonitor,
}

impl ApiClient {
    /// Create a new client reading credentials from `credentials`
    ///
    /// 401 responses are only logged until a handler is registered with
    /// [`ApiClient::with_unauthorized_handler`].
    pub fn new(config: ApiClientConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            config,
            authorizer: RequestAuthorizer::new(credentials),
            monitor: ResponseMonitor::passive(),
        })
    }

    /// Report 401 responses to `handler`
    pub fn with_unauthorized_handler(mut self, handler: Arc<dyn UnauthorizedHandler>) -> Self {
        self.monitor = ResponseMonitor::new(handler);
        self
    }

    /// Send a request through the full pipeline and decode the JSON body
    #[instrument(skip(self, request), fields(method = request.method.as_str(), path = %request.path))]
    pub async fn send<T>(&self, request: ApiRequest) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
    {
        let request = self.authorizer.authorize(request).await;
        let outcome = self.dispatch(request).await;
        self.monitor.observe(outcome).await
    }

    /// GET `path` and decode the body
    pub async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        Ok(self.send(ApiRequest::get(path)).await?.data)
    }

    /// POST a JSON body to `path` and decode the response
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(path).json_body(body)?;
        Ok(self.send(request).await?.data)
    }

    /// DELETE `path`, ignoring any response body
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send::<serde_json::Value>(ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// Execute an already-authorized request
    async fn dispatch<T>(&self, request: ApiRequest) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
    {
        let url = self.config.url_for(&request.path);
        let mut req = self.client.request(request.method.to_reqwest(), &url);

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        for (key, value) in &self.config.default_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
            // Authorization is owned by the authorizer, even when it sent none
            if name == AUTHORIZATION {
                debug!("Ignoring default Authorization header");
                continue;
            }
            let value =
                HeaderValue::from_str(value).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
            req = req.header(name, value);
        }

        req = req.headers(request.headers);

        if let Some(body) = request.body {
            if let Some(content_type) = &request.content_type {
                req = req.header(CONTENT_TYPE, content_type.as_str());
            }
            req = req.body(body);
        }

        let response = req.send().await.map_err(|e| {
            debug!(error = %e, "Request did not complete");
            ApiError::from(e)
        })?;

        Self::parse_response(response).await
    }

    /// Turn a reqwest response into an [`ApiResponse`] or [`ApiError`]
    async fn parse_response<T>(response: ReqwestResponse) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let headers = response.headers().clone();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        let bytes = response.bytes().await.map_err(ApiError::from)?;
        let data = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_slice(&bytes)
        }
        .map_err(|e| ApiError::Decode(e.to_string()))?;

        Ok(ApiResponse::new(status.as_u16(), headers, data))
    }

    /// Get the client configuration
    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Whether 401 responses are reported to a handler
    pub fn has_unauthorized_handler(&self) -> bool {
        self.monitor.has_handler()
    }
}
