//! Sonar Watcher - whale wallet signal detection for Base
//!
//! This is the main entry point for the watcher service.
//! It wires the Allium client, the polling engine and the Axum API.

mod allium;
mod config;
mod constants;
mod db;
mod error;
mod handlers;
mod metrics;
mod models;
mod monitoring;
mod notifications;
mod roster;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::allium::{AlliumClient, RequestQueue};
use crate::config::AppConfig;
use crate::handlers::{
    build_audience, get_audience, get_status, get_watchlist, health_check, health_simple,
    list_signals, update_watchlist, ApiState,
};
use crate::metrics::{metrics_router, MetricsState};
use crate::models::Signal;
use crate::monitoring::{PollingEngine, SignalEvaluator};
use crate::notifications::{CompositeNotifier, NotificationEvent, TelegramNotifier};
use crate::roster::{ProtocolDirectory, SocialDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    tracing::info!("Starting Sonar Watcher v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        chain = %config.poller.chain,
        "Configuration loaded"
    );

    // Initialize database
    let db_pool = db::init_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;
    tracing::info!("Database initialized");

    // Load the roster and the directories that enrich signals
    let mut wallets = roster::load_roster(&config.poller.roster_path)?;
    let watchlist = db::watchlist(&db_pool).await?;
    let watchlist_addresses: Vec<String> =
        watchlist.into_iter().map(|entry| entry.address).collect();
    roster::merge_watchlist(&mut wallets, &watchlist_addresses);

    let protocols = ProtocolDirectory::from_file(&config.poller.contracts_path)?;
    let social = SocialDirectory::from_roster(&wallets);
    tracing::info!(
        wallets = wallets.len(),
        known_protocols = protocols.len(),
        "Roster ready"
    );

    // Provider stack: queue under the client, client under the engine
    let queue = RequestQueue::new(config.queue.clone());
    let client = Arc::new(AlliumClient::new(&config.allium, queue));
    tracing::info!("Allium client initialized");

    // Metrics
    let metrics_state = Arc::new(MetricsState::new());

    // Notifications
    let mut notifier = CompositeNotifier::new();
    if let Some(telegram) = TelegramNotifier::from_config(&config.telegram) {
        notifier.add_service(Arc::new(telegram));
        tracing::info!("Telegram notifications enabled");
    }
    let notifier = Arc::new(notifier);

    // Build the engine
    let evaluator = SignalEvaluator::new(protocols, social);
    let (signal_tx, signal_rx) = mpsc::channel::<Signal>(256);
    let mut engine = PollingEngine::new(
        wallets,
        evaluator,
        client.clone(),
        &config.poller,
        signal_tx,
    );
    let engine_handle = engine.handle();

    if config.poller.warm_up_on_start {
        engine.warm_up().await;
    } else {
        tracing::warn!("Warm-up disabled, first cycle will report historical interactions");
    }

    // Spawn the engine loop
    let cancel = CancellationToken::new();
    let engine_cancel = cancel.clone();
    let engine_task = tokio::spawn(async move {
        engine.run(engine_cancel).await;
    });
    tracing::info!("Polling engine started");

    // Spawn the signal consumer: archive, then notify on fresh rows
    let consumer = spawn_signal_consumer(
        signal_rx,
        db_pool.clone(),
        metrics_state.clone(),
        notifier.clone(),
    );

    // Spawn the metrics mirror
    spawn_metrics_mirror(
        metrics_state.clone(),
        client.clone(),
        engine_handle.clone(),
        cancel.clone(),
    );

    notifier
        .notify(NotificationEvent::WatcherStarted {
            wallets: engine_handle.status().wallets.len(),
            chain: config.poller.chain.clone(),
        })
        .await;

    // Create shared state
    let api_state = Arc::new(ApiState {
        db: db_pool.clone(),
        engine: engine_handle.clone(),
        client: client.clone(),
        started_at: Utc::now(),
    });

    // API routes
    let api_routes = Router::new()
        .route("/signals", get(list_signals))
        .route("/status", get(get_status))
        .route("/watchlist", get(get_watchlist).post(update_watchlist))
        .route("/audience", post(build_audience))
        .route("/audience/:contract", get(get_audience))
        .with_state(api_state.clone());

    // Health routes (no authentication)
    let health_routes = Router::new()
        .route("/health", get(health_check))
        .with_state(api_state);

    // Simple health check for load balancers
    let root_routes = Router::new().route("/healthz", get(health_simple));

    // Build final router
    let app = Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(root_routes)
        .merge(metrics_router().with_state(metrics_state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    // Drain the engine before reporting final stats
    cancel.cancel();
    let _ = engine_task.await;
    let _ = consumer.await;

    notifier
        .notify(NotificationEvent::WatcherStopped {
            poll_cycles: engine_handle.poll_count(),
            signals: engine_handle.signal_count(),
        })
        .await;

    tracing::info!(
        poll_cycles = engine_handle.poll_count(),
        signals = engine_handle.signal_count(),
        "Sonar Watcher stopped"
    );

    Ok(())
}

/// Archive signals off the engine channel and notify on new rows.
fn spawn_signal_consumer(
    mut signal_rx: mpsc::Receiver<Signal>,
    db_pool: db::DbPool,
    metrics: Arc<MetricsState>,
    notifier: Arc<CompositeNotifier>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(signal) = signal_rx.recv().await {
            metrics.signals_emitted.inc();

            if let Err(reason) = signal.validate() {
                tracing::warn!(id = %signal.id, reason = %reason, "Dropping malformed signal");
                continue;
            }

            match db::insert_signal_if_new(&db_pool, &signal).await {
                Ok(true) => {
                    metrics.signals_persisted.inc();
                    let whale = signal
                        .display_name
                        .clone()
                        .unwrap_or_else(|| signal.context.wallet_label.clone());
                    let contract = signal
                        .context
                        .contract_protocol
                        .clone()
                        .unwrap_or_else(|| signal.target_contract.clone());
                    let failures = notifier
                        .notify(NotificationEvent::SignalDetected {
                            whale,
                            persona: signal.persona.clone(),
                            contract,
                            score: signal.actionability_score,
                            first_mover: signal.is_first_mover,
                            neighbors: signal.common_neighbors,
                        })
                        .await;
                    if failures > 0 {
                        metrics.notification_failures.inc_by(failures as u64);
                    }
                }
                Ok(false) => {
                    tracing::debug!(
                        hash = %signal.transaction_hash,
                        "Signal already archived, skipping"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, id = %signal.id, "Failed to archive signal");
                }
            }
        }
        tracing::info!("Signal consumer stopped");
    })
}

/// Periodically mirror queue and engine counters into Prometheus.
fn spawn_metrics_mirror(
    metrics: Arc<MetricsState>,
    client: Arc<AlliumClient>,
    engine: Arc<crate::monitoring::PollerHandle>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(15));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    metrics.record_queue_stats(&client.queue_stats());
                    metrics.record_poll_cycles(engine.poll_count());
                }
            }
        }
    });
}

/// Resolve on Ctrl-C or SIGTERM and cancel the background tasks.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }

    cancel.cancel();
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sonar_watcher=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Load and validate configuration
fn load_config() -> anyhow::Result<AppConfig> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    if let Err(e) = config.validate() {
        // In development, allow a missing API key
        if std::env::var("SONAR_DEV_MODE").is_ok() {
            tracing::warn!("Running in dev mode - skipping configuration validation");
        } else {
            return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
        }
    }

    Ok(config)
}
