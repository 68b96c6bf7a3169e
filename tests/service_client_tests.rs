//! # 业务客户端集成测试

mod common;

use common::{RecordingNavigator, auth_config, expiring_token, fresh_token, init_test_env};
use mfi_resilience::auth::{CredentialStore, HttpAuthApi, TokenLifecycleManager};
use mfi_resilience::cache::{CacheKeyBuilder, TtlCache, invalidate_ratings};
use mfi_resilience::{ClientError, RetryPolicy, ServiceClient};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    client: ServiceClient,
    store: CredentialStore,
    navigator: Arc<RecordingNavigator>,
}

fn fixture(server: &MockServer) -> Fixture {
    init_test_env();
    let config = auth_config(server);
    let store = CredentialStore::in_memory();
    let navigator = Arc::new(RecordingNavigator::at("/dashboard"));
    let lifecycle = TokenLifecycleManager::new(
        store.clone(),
        Arc::new(HttpAuthApi::new(&config)),
        navigator.clone(),
        config.clone(),
    );
    let policy = RetryPolicy::default()
        .with_base_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_millis(50))
        .with_jitter(false);
    let client = ServiceClient::with_parts(
        reqwest::Client::new(),
        &config.base_url,
        lifecycle,
        policy,
        Arc::new(TtlCache::new(Duration::from_secs(300))),
    );
    Fixture {
        client,
        store,
        navigator,
    }
}

#[tokio::test]
async fn test_get_retries_transient_failures_with_auth_header() {
    let server = MockServer::start().await;
    let token = fresh_token();
    let bearer = format!("Bearer {token}");

    Mock::given(method("GET"))
        .and(path("/api/leaderboard"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/leaderboard"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "officer": "A", "rank": 1 }])))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server);
    f.store.write(&token, Some("refresh-1"));

    let body = f.client.get_json("/leaderboard").await.unwrap();
    assert_eq!(body, json!([{ "officer": "A", "rank": 1 }]));
}

#[tokio::test]
async fn test_get_does_not_retry_validation_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/branches/unknown"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "detail": "unknown branch" })))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server);
    f.store.write(&fresh_token(), None);

    let err = f.client.get_json("/branches/unknown").await.unwrap_err();
    assert!(matches!(err, ClientError::Http { status: 422, .. }));
}

#[tokio::test]
async fn test_exhausted_retries_return_original_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/aggregates"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let f = fixture(&server);
    f.store.write(&fresh_token(), None);

    let err = f.client.get_json("/aggregates").await.unwrap_err();
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn test_cached_get_hits_server_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/leaderboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{ "officer": "A" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server);
    f.store.write(&fresh_token(), None);
    let key = CacheKeyBuilder::leaderboard("officers", "monthly", 10);

    let first = f
        .client
        .get_json_cached("/leaderboard", key.clone(), None)
        .await
        .unwrap();
    let second = f
        .client
        .get_json_cached("/leaderboard", key.clone(), None)
        .await
        .unwrap();

    assert_eq!(first, json!([{ "officer": "A" }]));
    assert_eq!(first, second);
    assert!(f.client.cache().has(&key.build()));
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ratings"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let f = fixture(&server);
    f.store.write(&fresh_token(), None);

    let key = CacheKeyBuilder::current_ratings("all");
    assert!(f.client.get_json_cached("/ratings", key.clone(), None).await.is_err());
    assert!(!f.client.cache().has(&key.build()));
}

#[tokio::test]
async fn test_expiring_token_is_refreshed_before_request() {
    let server = MockServer::start().await;
    let rotated = fresh_token();

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": rotated })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header("authorization", format!("Bearer {rotated}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 42 })))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server);
    f.store.write(&expiring_token(), Some("refresh-1"));

    let me = f.client.get_json("/me").await.unwrap();
    assert_eq!(me["id"], 42);
    // 没有新的刷新令牌时保留旧的
    assert_eq!(f.store.read().unwrap().refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_mutation_is_not_retried_and_invalidates_by_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ratings/recalculate"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/ratings/recalculate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    let f = fixture(&server);
    f.store.write(&fresh_token(), None);
    let cache = f.client.cache();
    cache.set(CacheKeyBuilder::leaderboard("officers", "monthly", 10), json!([]), None);
    cache.set(CacheKeyBuilder::branch_aggregate("12", "par30"), json!(0.04), None);

    let err = f
        .client
        .post_json("/ratings/recalculate", &json!({ "period": "monthly" }))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));

    f.client
        .post_json("/ratings/recalculate", &json!({ "period": "monthly" }))
        .await
        .unwrap();
    assert_eq!(invalidate_ratings(cache), 1);
    assert_eq!(cache.stats().keys, vec!["branch_aggregate:12:par30".to_string()]);
}

#[tokio::test]
async fn test_unsuccessful_envelope_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/reports/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "report locked"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server);
    f.store.write(&fresh_token(), None);

    let err = f.client.get_json("/reports/7").await.unwrap_err();
    assert!(err.to_string().contains("report locked"));
}

#[tokio::test]
async fn test_revoked_token_forces_logout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "token revoked" })))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server);
    f.store.write(&fresh_token(), Some("refresh-1"));

    let err = f.client.get_json("/me").await.unwrap_err();
    assert!(matches!(err, ClientError::Http { status: 401, .. }));
    assert!(f.store.read().is_none());

    let visits = f.navigator.visits();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].reason, "session_expired");
    assert_eq!(visits[0].redirect, "/dashboard");
}

#[tokio::test]
async fn test_mutation_401_forces_logout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/loans"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server);
    f.store.write(&fresh_token(), Some("refresh-1"));

    let err = f
        .client
        .post_json("/loans", &json!({ "amount": 500 }))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(f.store.read().is_none());
    assert_eq!(f.navigator.visits().len(), 1);
}

#[tokio::test]
async fn test_forbidden_does_not_log_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/branches"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server);
    f.store.write(&fresh_token(), Some("refresh-1"));

    let err = f.client.get_json("/admin/branches").await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert!(f.store.read().is_some());
    assert!(f.navigator.visits().is_empty());
}
