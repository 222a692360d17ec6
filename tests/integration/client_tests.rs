//! Allium Client Integration Tests
//!
//! Spins up an in-process fake provider and drives the real client
//! through the queue:
//! - Envelope unwrapping and auth headers
//! - 429 retry with recovery
//! - Fail-fast on non-rate-limit errors
//! - The three-leg Explorer SQL flow

use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use sonar_watcher::{AlliumClient, AlliumConfig, AppError, QueueConfig, RequestQueue};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const WHALE: &str = "0x83d55acdc72027ed339d267eebaf9a41e47490d5";

async fn spawn_fake_allium(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn test_config(base_url: String) -> AlliumConfig {
    AlliumConfig {
        api_key: "test-key".to_string(),
        query_id: "q-test".to_string(),
        base_url,
        timeout_secs: 5,
        sql_poll_interval_ms: 5,
        sql_max_poll_attempts: 10,
        credentials_file_fallback: false,
    }
}

fn fast_queue() -> Arc<RequestQueue> {
    RequestQueue::new(QueueConfig {
        min_interval_ms: 1,
        max_retries: 3,
        backoff_base_ms: 1,
    })
}

#[tokio::test]
async fn test_wallet_transactions_unwrap_and_auth() {
    let captured: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().route(
        "/api/v1/developer/wallet/transactions",
        post({
            let captured = captured.clone();
            move |headers: HeaderMap, Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    let key = headers
                        .get("x-api-key")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    captured.lock().push((key, body));
                    Json(json!({
                        "items": [
                            { "hash": "0xh2", "from_address": WHALE, "to_address": "0xBBB" },
                            { "hash": "0xh1", "from_address": WHALE, "to_address": "0xAAA" }
                        ]
                    }))
                }
            }
        }),
    );

    let base_url = spawn_fake_allium(app).await;
    let client = AlliumClient::new(&test_config(base_url), fast_queue());

    let transactions = client.get_wallet_transactions("base", WHALE).await.unwrap();

    // Newest-first order preserved from the provider
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0].hash, "0xh2");
    assert_eq!(transactions[1].hash, "0xh1");
    assert_eq!(transactions[0].destination(), Some("0xBBB"));

    let captured = captured.lock();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].0, "test-key");
    // Body is the one-element array the endpoint expects
    assert_eq!(captured[0].1, json!([{ "chain": "base", "address": WHALE }]));
}

#[tokio::test]
async fn test_rate_limited_request_recovers() {
    let hits = Arc::new(AtomicU32::new(0));
    let app = Router::new().route(
        "/api/v1/developer/wallet/transactions",
        post({
            let hits = hits.clone();
            move || {
                let hits = hits.clone();
                async move {
                    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response()
                    } else {
                        Json(json!({ "items": [
                            { "hash": "0xh1", "to_address": "0xAAA" }
                        ]}))
                        .into_response()
                    }
                }
            }
        }),
    );

    let base_url = spawn_fake_allium(app).await;
    let queue = fast_queue();
    let client = AlliumClient::new(&test_config(base_url), queue);

    let transactions = client.get_wallet_transactions("base", WHALE).await.unwrap();
    assert_eq!(transactions.len(), 1);

    // Two 429s then the success, all one submission
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    let stats = client.queue_stats();
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.rate_limited, 2);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.errored, 0);
}

#[tokio::test]
async fn test_server_error_fails_without_retry() {
    let hits = Arc::new(AtomicU32::new(0));
    let app = Router::new().route(
        "/api/v1/developer/wallet/transactions",
        post({
            let hits = hits.clone();
            move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
                }
            }
        }),
    );

    let base_url = spawn_fake_allium(app).await;
    let client = AlliumClient::new(&test_config(base_url), fast_queue());

    let err = client
        .get_wallet_transactions("base", WHALE)
        .await
        .unwrap_err();
    match err {
        AppError::Provider { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("exploded"));
        }
        other => panic!("expected Provider error, got {:?}", other),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(client.queue_stats().errored, 1);
}

fn explorer_router(status_calls: Arc<AtomicU32>, outcomes: &'static [&'static str]) -> Router {
    Router::new()
        .route(
            "/api/v1/explorer/queries/q-test/run-async",
            post(|| async { Json(json!({ "run_id": "run-42" })) }),
        )
        .route(
            "/api/v1/explorer/query-runs/run-42/status",
            get({
                let status_calls = status_calls.clone();
                move || {
                    let status_calls = status_calls.clone();
                    async move {
                        let call = status_calls.fetch_add(1, Ordering::SeqCst) as usize;
                        let status = outcomes[call.min(outcomes.len() - 1)];
                        // The real endpoint answers with a bare quoted string
                        Json(status)
                    }
                }
            }),
        )
        .route(
            "/api/v1/explorer/query-runs/run-42/results",
            get(|| async {
                Json(json!({
                    "sql": "SELECT wallet_address, total_volume_usd FROM t",
                    "data": [
                        { "wallet_address": "0x1111111111111111111111111111111111111111",
                          "total_volume_usd": 1_500_000.0 }
                    ],
                    "meta": {}
                }))
            }),
        )
}

#[tokio::test]
async fn test_run_query_polls_until_success() {
    let status_calls = Arc::new(AtomicU32::new(0));
    let app = explorer_router(status_calls.clone(), &["queued", "running", "success"]);
    let base_url = spawn_fake_allium(app).await;
    let client = AlliumClient::new(&test_config(base_url), fast_queue());

    let rows = client.run_query("SELECT 1").await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0]["wallet_address"],
        "0x1111111111111111111111111111111111111111"
    );
    assert_eq!(rows[0]["total_volume_usd"], 1_500_000.0);
    // queued, running, then the terminal success
    assert_eq!(status_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_run_query_surfaces_failed_status() {
    let status_calls = Arc::new(AtomicU32::new(0));
    let app = explorer_router(status_calls.clone(), &["failed"]);
    let base_url = spawn_fake_allium(app).await;
    let client = AlliumClient::new(&test_config(base_url), fast_queue());

    let err = client.run_query("SELECT 1").await.unwrap_err();
    match err {
        AppError::QueryRun { run_id, status, .. } => {
            assert_eq!(run_id, "run-42");
            assert_eq!(status, "failed");
        }
        other => panic!("expected QueryRun error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_run_query_requires_configured_slot() {
    let mut config = test_config("http://127.0.0.1:9".to_string());
    config.query_id = String::new();
    let client = AlliumClient::new(&config, fast_queue());

    let err = client.run_query("SELECT 1").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
