//! Integration tests for the request pipeline
//!
//! These tests use wiremock to stand in for the finance API and exercise
//! authorize → dispatch → monitor end to end.

use api_client::{ApiClient, ApiClientConfig, ApiError, ApiRequest, UnauthorizedHandler};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storage::{CredentialStore, KvCredentialStore};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct CountingHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl UnauthorizedHandler for CountingHandler {
    async fn on_unauthorized(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl CountingHandler {
    fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct Harness {
    server: MockServer,
    store: Arc<KvCredentialStore>,
    handler: Arc<CountingHandler>,
    client: ApiClient,
}

async fn harness() -> Harness {
    harness_with(|config| config).await
}

async fn harness_with(tweak: impl FnOnce(ApiClientConfig) -> ApiClientConfig) -> Harness {
    let server = MockServer::start().await;
    let store = Arc::new(KvCredentialStore::in_memory().unwrap());
    let handler = Arc::new(CountingHandler::default());

    let config = tweak(ApiClientConfig::new(format!("{}/api/", server.uri())));
    let client = ApiClient::new(config, store.clone())
        .unwrap()
        .with_unauthorized_handler(handler.clone());

    Harness { server, store, handler, client }
}

// =============================================================================
// Request Authorization
// =============================================================================

#[tokio::test]
async fn test_request_carries_stored_token() {
    let h = harness().await;
    h.store.save("tok-1").await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/score/"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 72})))
        .expect(1)
        .mount(&h.server)
        .await;

    let score: Value = h.client.get("score/").await.unwrap();
    assert_eq!(score["score"], 72);
}

#[tokio::test]
async fn test_request_without_token_has_no_header() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a"})))
        .mount(&h.server)
        .await;

    let _: Value = h.client.post("token/", &json!({"username": "u", "password": "p"})).await.unwrap();

    let requests = h.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_token_change_applies_to_next_request() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/goals/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&h.server)
        .await;

    h.store.save("first").await.unwrap();
    let _: Value = h.client.get("goals/").await.unwrap();
    h.store.save("second").await.unwrap();
    let _: Value = h.client.get("goals/").await.unwrap();
    h.store.clear().await.unwrap();
    let _: Value = h.client.get("goals/").await.unwrap();

    let requests = h.server.received_requests().await.unwrap();
    let seen: Vec<Option<String>> = requests
        .iter()
        .map(|r| r.headers.get("authorization").map(|v| v.to_str().unwrap().to_string()))
        .collect();
    assert_eq!(
        seen,
        vec![Some("Bearer first".to_string()), Some("Bearer second".to_string()), None]
    );
}

#[tokio::test]
async fn test_body_and_query_pass_through_unchanged() {
    let h = harness().await;
    h.store.save("tok").await.unwrap();

    let body = json!({"category": "expense", "amount": 45.5, "description": "Lunch"});
    Mock::given(method("POST"))
        .and(path("/api/transactions/"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 1, "category": "expense", "amount": 45.5, "description": "Lunch"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let request = ApiRequest::post("transactions/").param("source", "app").json_body(&body).unwrap();
    let response = h.client.send::<Value>(request).await.unwrap();
    assert_eq!(response.status, 201);

    let requests = h.server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("source=app"));
}

// =============================================================================
// Response Monitoring
// =============================================================================

#[tokio::test]
async fn test_401_notifies_handler_and_returns_error() {
    let h = harness().await;
    h.store.save("expired").await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/me/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Given token not valid for any token type"})),
        )
        .mount(&h.server)
        .await;

    let err = h.client.get::<Value>("me/").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(err.to_string().contains("Given token not valid"));
    assert_eq!(h.handler.count(), 1);
}

#[tokio::test]
async fn test_other_statuses_do_not_notify_handler() {
    let h = harness().await;
    h.store.save("tok").await.unwrap();

    for (route, status) in [("/api/a/", 403), ("/api/b/", 404), ("/api/c/", 500)] {
        Mock::given(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(&h.server)
            .await;
    }

    for (route, status) in [("a/", 403), ("b/", 404), ("c/", 500)] {
        let err = h.client.get::<Value>(route).await.unwrap_err();
        assert_eq!(err.status(), Some(status));
    }

    assert_eq!(h.handler.count(), 0);
    assert_eq!(h.store.read().await.unwrap().as_deref(), Some("tok"));
}

#[tokio::test]
async fn test_timeout_is_not_an_authorization_failure() {
    let h = harness_with(|c| c.with_timeout(Duration::from_millis(100))).await;
    h.store.save("tok").await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/forecast-v2/"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_secs(2)))
        .mount(&h.server)
        .await;

    let err = h.client.get::<Value>("forecast-v2/").await.unwrap_err();
    assert_eq!(err, ApiError::Timeout);
    assert_eq!(h.handler.count(), 0);
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let store = Arc::new(KvCredentialStore::in_memory().unwrap());
    let handler = Arc::new(CountingHandler::default());
    let client = ApiClient::new(ApiClientConfig::new("http://127.0.0.1:9/api/"), store)
        .unwrap()
        .with_unauthorized_handler(handler.clone());

    let err = client.get::<Value>("score/").await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(handler.count(), 0);
}

#[tokio::test]
async fn test_concurrent_401s_each_reach_handler() {
    let h = harness().await;
    h.store.save("expired").await.unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(20)))
        .mount(&h.server)
        .await;

    let calls = ["income/", "expenses/", "goals/", "score/"]
        .into_iter()
        .map(|route| {
            let client = h.client.clone();
            tokio::spawn(async move { client.get::<Value>(route).await })
        })
        .collect::<Vec<_>>();

    for call in calls {
        assert!(call.await.unwrap().unwrap_err().is_unauthorized());
    }

    // Deduplication is the handler's job; the monitor reports every 401
    assert_eq!(h.handler.count(), 4);
}

// =============================================================================
// Response Decoding
// =============================================================================

#[tokio::test]
async fn test_empty_body_decodes_as_unit() {
    let h = harness().await;

    Mock::given(method("DELETE"))
        .and(path("/api/goals/9/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client.delete("goals/9/").await.unwrap();
}

#[tokio::test]
async fn test_malformed_success_body_is_decode_error() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/me/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&h.server)
        .await;

    let err = h.client.get::<Value>("me/").await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
    assert_eq!(h.handler.count(), 0);
}

#[tokio::test]
async fn test_default_headers_are_sent() {
    let h = harness_with(|c| c.with_header("X-Client", "mobile")).await;

    Mock::given(method("GET"))
        .and(path("/api/income/"))
        .and(header("x-client", "mobile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;

    let _: Value = h.client.get("income/").await.unwrap();
}

#[tokio::test]
async fn test_default_authorization_header_is_never_sent() {
    let h = harness_with(|c| c.with_header("Authorization", "Bearer stale-default")).await;

    Mock::given(method("GET"))
        .and(path("/api/score/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 1})))
        .mount(&h.server)
        .await;

    let _: Value = h.client.get("score/").await.unwrap();
    h.store.save("tok-1").await.unwrap();
    let _: Value = h.client.get("score/").await.unwrap();

    let requests = h.server.received_requests().await.unwrap();
    let seen: Vec<Option<String>> = requests
        .iter()
        .map(|r| r.headers.get("authorization").map(|v| v.to_str().unwrap().to_string()))
        .collect();
    assert_eq!(seen, vec![None, Some("Bearer tok-1".to_string())]);
}
