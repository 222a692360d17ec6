//! Polling Engine Integration Tests
//!
//! Runs the real engine against an in-process fake provider:
//! - Warm-up seeding followed by a live cycle
//! - Cooperative shutdown through the cancellation token
//! - Per-wallet failure isolation

use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use sonar_watcher::config::PollerConfig;
use sonar_watcher::roster::{ProtocolDirectory, SocialDirectory};
use sonar_watcher::{
    AlliumClient, AlliumConfig, PollingEngine, QueueConfig, RequestQueue, Signal, SignalEvaluator,
    TrackedWallet, Vertical,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const W1: &str = "0x83d55acdc72027ed339d267eebaf9a41e47490d5";
const W2: &str = "0x3725bd4d175283108156c3f15f86e1c51266155d";

fn make_wallet(address: &str, label: &str) -> TrackedWallet {
    TrackedWallet {
        address: address.to_string(),
        vertical: Vertical::DeFi,
        label: label.to_string(),
        volume_30d_usd: Some(2_000_000_000.0),
        name: None,
        persona: None,
        known_contracts: HashSet::new(),
        last_seen_tx_hash: None,
    }
}

async fn spawn_fake_chain(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn make_engine(
    base_url: String,
    wallets: Vec<TrackedWallet>,
    first_delay_secs: u64,
) -> (PollingEngine, mpsc::Receiver<Signal>) {
    let queue = RequestQueue::new(QueueConfig {
        min_interval_ms: 1,
        max_retries: 1,
        backoff_base_ms: 1,
    });
    let allium = AlliumConfig {
        api_key: "test-key".to_string(),
        query_id: "q-test".to_string(),
        base_url,
        timeout_secs: 5,
        sql_poll_interval_ms: 10,
        sql_max_poll_attempts: 2,
        credentials_file_fallback: false,
    };
    let client = Arc::new(AlliumClient::new(&allium, queue));

    let poller = PollerConfig {
        chain: "base".to_string(),
        interval_secs: 1,
        first_delay_secs,
        roster_path: PathBuf::from("/nonexistent/wallets.json"),
        contracts_path: PathBuf::from("/nonexistent/contracts.json"),
        warm_up_on_start: true,
    };
    let evaluator = SignalEvaluator::new(ProtocolDirectory::default(), SocialDirectory::default());

    let (tx, rx) = mpsc::channel::<Signal>(16);
    let engine = PollingEngine::new(wallets, evaluator, client, &poller, tx);
    (engine, rx)
}

/// Every wallet first sees a one-transaction history page; once warmed
/// up, later pages stack one fresh interaction on top of it.
fn growing_chain_router() -> Router {
    let calls: Arc<Mutex<HashMap<String, u32>>> = Arc::new(Mutex::new(HashMap::new()));
    Router::new().route(
        "/api/v1/developer/wallet/transactions",
        post(move |Json(body): Json<Value>| {
            let calls = calls.clone();
            async move {
                let address = body[0]["address"].as_str().unwrap_or("").to_string();
                let count = {
                    let mut calls = calls.lock();
                    let entry = calls.entry(address.clone()).or_insert(0);
                    *entry += 1;
                    *entry
                };
                let history = json!({
                    "hash": format!("h1-{}", address),
                    "to_address": "0xHist",
                    "block_timestamp": "2026-08-20T09:00:00Z"
                });
                if count == 1 {
                    Json(json!({ "items": [history] }))
                } else {
                    Json(json!({ "items": [
                        {
                            "hash": format!("h2-{}", address),
                            "to_address": "0xFresh",
                            "block_timestamp": "2026-08-20T10:00:00Z"
                        },
                        history
                    ]}))
                }
            }
        }),
    )
}

#[tokio::test]
async fn test_warm_up_then_cycle_emits_only_fresh_interactions() {
    let base_url = spawn_fake_chain(growing_chain_router()).await;
    let wallets = vec![make_wallet(W1, "DeFi Whale #1"), make_wallet(W2, "DeFi Whale #2")];
    let (mut engine, mut rx) = make_engine(base_url, wallets, 0);
    let handle = engine.handle();

    engine.warm_up().await;

    // Warm-up emitted nothing but seeded both wallets
    let status = handle.status();
    assert_eq!(status.signal_count, 0);
    assert!(status.wallets.iter().all(|w| w.known_contracts == 1));

    let cancel = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(cancel.clone()));

    // First cycle: one fresh contract per wallet, in roster order
    let first = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.wallet, W1);
    assert_eq!(first.target_contract, "0xFresh");
    assert!(first.is_first_mover);
    assert_eq!(first.common_neighbors, 0);

    let second = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.wallet, W2);
    assert!(!second.is_first_mover);
    assert_eq!(second.common_neighbors, 1);

    cancel.cancel();
    timeout(Duration::from_secs(5), engine_task)
        .await
        .unwrap()
        .unwrap();

    assert!(!handle.is_running());
    assert!(handle.poll_count() >= 1);
    assert_eq!(handle.signal_count(), 2);
}

#[tokio::test]
async fn test_cancellation_before_first_tick() {
    let base_url = spawn_fake_chain(growing_chain_router()).await;
    let (engine, _rx) = make_engine(base_url, vec![make_wallet(W1, "DeFi Whale #1")], 60);
    let handle = engine.handle();

    let cancel = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(cancel.clone()));

    // Give the task a moment to enter its loop
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.is_running());

    cancel.cancel();
    timeout(Duration::from_secs(5), engine_task)
        .await
        .unwrap()
        .unwrap();

    assert!(!handle.is_running());
    assert_eq!(handle.poll_count(), 0);
    assert_eq!(handle.signal_count(), 0);
}

#[tokio::test]
async fn test_failing_wallet_does_not_block_the_rest() {
    // W1 always errors; W2 serves a single-transaction page
    let app = Router::new().route(
        "/api/v1/developer/wallet/transactions",
        post(|Json(body): Json<Value>| async move {
            let address = body[0]["address"].as_str().unwrap_or("");
            if address == W1 {
                (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
            } else {
                Json(json!({ "items": [{
                    "hash": "0xonly",
                    "to_address": "0xNew",
                    "block_timestamp": "2026-08-20T10:00:00Z"
                }]}))
                .into_response()
            }
        }),
    );

    let base_url = spawn_fake_chain(app).await;
    let wallets = vec![make_wallet(W1, "DeFi Whale #1"), make_wallet(W2, "DeFi Whale #2")];
    let (engine, mut rx) = make_engine(base_url, wallets, 0);
    let handle = engine.handle();

    let cancel = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(cancel.clone()));

    let signal = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(signal.wallet, W2);
    assert_eq!(signal.target_contract, "0xNew");

    cancel.cancel();
    timeout(Duration::from_secs(5), engine_task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(handle.signal_count(), 1);
    assert!(handle.poll_count() >= 1);
}
