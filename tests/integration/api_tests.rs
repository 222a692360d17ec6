//! API Integration Tests
//!
//! Drives the real routers and handlers over a throwaway database:
//! - Health endpoints
//! - Signals listing
//! - Status reporting
//! - Watchlist updates and validation
//! - Stored audience reads

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use sonar_watcher::config::DatabaseConfig;
use sonar_watcher::db::{self, AudienceMember};
use sonar_watcher::handlers::{
    build_audience, get_audience, get_status, get_watchlist, health_check, health_simple,
    list_signals, update_watchlist, ApiState,
};
use sonar_watcher::models::{Signal, SignalContext, SignalKind, Vertical};
use sonar_watcher::{AlliumClient, AlliumConfig, PollerHandle, QueueConfig, RequestQueue};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_state() -> (Arc<ApiState>, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("sonar-test.db"),
        max_connections: 5,
    };
    let pool = db::init_pool(&config).await.unwrap();
    db::run_migrations_from(&pool, Path::new("database/schema.sql"))
        .await
        .unwrap();

    let queue = RequestQueue::new(QueueConfig {
        min_interval_ms: 1,
        max_retries: 0,
        backoff_base_ms: 1,
    });
    // Points at a closed port; these tests never reach the provider
    let allium = AlliumConfig {
        api_key: "test-key".to_string(),
        query_id: "q-test".to_string(),
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: 1,
        sql_poll_interval_ms: 10,
        sql_max_poll_attempts: 2,
        credentials_file_fallback: false,
    };

    let state = Arc::new(ApiState {
        db: pool,
        engine: Arc::new(PollerHandle::default()),
        client: Arc::new(AlliumClient::new(&allium, queue)),
        started_at: Utc::now(),
    });
    (state, dir)
}

/// Same route layout the service builds at startup, minus middleware.
fn app(state: Arc<ApiState>) -> Router {
    let api_routes = Router::new()
        .route("/signals", get(list_signals))
        .route("/status", get(get_status))
        .route("/watchlist", get(get_watchlist).post(update_watchlist))
        .route("/audience", post(build_audience))
        .route("/audience/:contract", get(get_audience))
        .with_state(state.clone());

    Router::new()
        .nest("/api", api_routes)
        .route("/healthz", get(health_simple))
        .merge(Router::new().route("/health", get(health_check)).with_state(state))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

async fn post_json(app: Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

fn sample_signal(seq: u64) -> Signal {
    Signal {
        id: format!("sig-{}", seq),
        kind: SignalKind::NewContract,
        wallet: "0x83d55acdc72027ed339d267eebaf9a41e47490d5".to_string(),
        vertical: Vertical::DeFi,
        transaction_hash: format!("0xhash{}", seq),
        target_contract: "0xCc00FF".to_string(),
        timestamp: "2026-08-20T10:00:00Z".to_string(),
        actionability_score: 4,
        is_first_mover: true,
        vertical_tag: "Aerodrome".to_string(),
        common_neighbors: 0,
        display_name: Some("vitalik.eth".to_string()),
        persona: "DeFi Architect & OG".to_string(),
        context: SignalContext {
            wallet_label: "DeFi Whale #1".to_string(),
            contract_protocol: Some("Aerodrome".to_string()),
            tokens_involved: None,
            method_name: Some("swap".to_string()),
        },
    }
}

// =============================================================================
// HEALTH
// =============================================================================

#[tokio::test]
async fn test_healthz_returns_ok() {
    let (state, _dir) = test_state().await;
    let response = app(state)
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// With the engine not running the service is degraded but still up.
#[tokio::test]
async fn test_health_reports_degraded_engine() {
    let (state, _dir) = test_state().await;
    let (status, json) = get_json(app(state), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["engine_running"], false);
    assert_eq!(json["database"]["status"], "healthy");
    assert!(json["uptime_seconds"].is_number());
    assert_eq!(json["queue_depth"], 0);
}

// =============================================================================
// SIGNALS
// =============================================================================

#[tokio::test]
async fn test_signals_empty_archive() {
    let (state, _dir) = test_state().await;
    let (status, json) = get_json(app(state), "/api/signals").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);
    assert_eq!(json["signals"], json!([]));
}

#[tokio::test]
async fn test_signals_serve_archived_rows() {
    let (state, _dir) = test_state().await;
    for seq in 1..=2u64 {
        db::insert_signal_if_new(&state.db, &sample_signal(seq))
            .await
            .unwrap();
    }

    let (status, json) = get_json(app(state), "/api/signals").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);

    // Newest first, context inflated back to JSON
    let newest = &json["signals"][0];
    assert_eq!(newest["id"], "sig-2");
    assert_eq!(newest["type"], "NEW_CONTRACT");
    assert_eq!(newest["vertical_tag"], "Aerodrome");
    assert_eq!(newest["context"]["wallet_label"], "DeFi Whale #1");
    assert_eq!(newest["context"]["method_name"], "swap");
    assert!(newest["detected_at"].is_string());
}

#[tokio::test]
async fn test_signals_limit_is_clamped() {
    let (state, _dir) = test_state().await;
    for seq in 1..=3u64 {
        db::insert_signal_if_new(&state.db, &sample_signal(seq))
            .await
            .unwrap();
    }

    // limit=0 clamps up to 1
    let (status, json) = get_json(app(state.clone()), "/api/signals?limit=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);

    let (_, json) = get_json(app(state), "/api/signals?limit=2").await;
    assert_eq!(json["total"], 2);
}

// =============================================================================
// STATUS
// =============================================================================

#[tokio::test]
async fn test_status_reports_engine_and_queue() {
    let (state, _dir) = test_state().await;
    db::insert_signal_if_new(&state.db, &sample_signal(1))
        .await
        .unwrap();

    let (status, json) = get_json(app(state), "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["engine"]["running"], false);
    assert_eq!(json["engine"]["poll_count"], 0);
    assert!(json["engine"]["wallets"].is_array());
    assert_eq!(json["api"]["submitted"], 0);
    assert_eq!(json["signals_stored"], 1);
    assert!(json["uptime_seconds"].is_number());
}

// =============================================================================
// WATCHLIST
// =============================================================================

#[tokio::test]
async fn test_watchlist_add_list_remove() {
    let (state, _dir) = test_state().await;
    let address = "0x9AEC2CB83351BB03BAB237985EFF6464D2C58633";

    let (status, json) = post_json(
        app(state.clone()),
        "/api/watchlist",
        json!({ "address": address, "action": "add" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["changed"], true);
    assert_eq!(json["address"], address.to_lowercase());

    // Duplicate add reports changed=false
    let (_, json) = post_json(
        app(state.clone()),
        "/api/watchlist",
        json!({ "address": address, "action": "add" }),
    )
    .await;
    assert_eq!(json["changed"], false);

    let (_, json) = get_json(app(state.clone()), "/api/watchlist").await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["wallets"][0]["address"], address.to_lowercase());

    let (_, json) = post_json(
        app(state),
        "/api/watchlist",
        json!({ "address": address, "action": "remove" }),
    )
    .await;
    assert_eq!(json["changed"], true);
}

#[tokio::test]
async fn test_watchlist_rejects_malformed_address() {
    let (state, _dir) = test_state().await;
    let (status, json) = post_json(
        app(state),
        "/api/watchlist",
        json!({ "address": "banana", "action": "add" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "rejected");
    assert_eq!(json["reason"], "validation_failed");
}

#[tokio::test]
async fn test_watchlist_rejects_unknown_action() {
    let (state, _dir) = test_state().await;
    let (status, json) = post_json(
        app(state),
        "/api/watchlist",
        json!({
            "address": "0x9aec2cb83351bb03bab237985eff6464d2c58633",
            "action": "purge"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["details"].as_str().unwrap().contains("purge"));
}

// =============================================================================
// AUDIENCE
// =============================================================================

#[tokio::test]
async fn test_audience_read_of_stored_build() {
    let (state, _dir) = test_state().await;
    let contract = "0xabcdef0123456789abcdef0123456789abcdef01";
    db::save_audience(
        &state.db,
        contract,
        &[AudienceMember {
            wallet_address: "0x1111111111111111111111111111111111111111".to_string(),
            volume_30d_usd: Some(2_500_000.0),
        }],
    )
    .await
    .unwrap();

    let (status, json) = get_json(app(state), &format!("/api/audience/{}", contract)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["target_contract"], contract);
    assert_eq!(json["total"], 1);
    assert_eq!(
        json["members"][0]["wallet_address"],
        "0x1111111111111111111111111111111111111111"
    );
}

#[tokio::test]
async fn test_audience_missing_build_is_404() {
    let (state, _dir) = test_state().await;
    let (status, json) = get_json(
        app(state),
        "/api/audience/0xabcdef0123456789abcdef0123456789abcdef01",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["reason"], "not_found");
}

#[tokio::test]
async fn test_audience_rejects_malformed_contract() {
    let (state, _dir) = test_state().await;
    let (status, _) = get_json(app(state), "/api/audience/not-a-contract").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
