//! REST API handlers for Sonar Watcher
//!
//! Provides endpoints for:
//! - Signals: recent detections from the archive
//! - Status: engine counters and provider queue stats
//! - Watchlist: runtime wallet additions and removals
//! - Audience: lookalike audiences built via Explorer SQL

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::allium::templates::lookalike_audience_sql;
use crate::allium::{AlliumClient, QueueStats};
use crate::db::{self, AudienceMember, DbPool, StoredSignal, WatchlistEntry};
use crate::error::AppError;
use crate::monitoring::{EngineStatus, PollerHandle};

// =============================================================================
// API STATE
// =============================================================================

/// Shared state for API handlers
pub struct ApiState {
    pub db: DbPool,
    /// Engine counters, shared with the polling task
    pub engine: Arc<PollerHandle>,
    /// Allium client for ad-hoc Explorer queries
    pub client: Arc<AlliumClient>,
    /// Application start time
    pub started_at: chrono::DateTime<Utc>,
}

fn is_evm_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

// =============================================================================
// SIGNALS API
// =============================================================================

/// Query parameters for the signals list
#[derive(Debug, Deserialize)]
pub struct SignalsQuery {
    /// Maximum rows to return (default 50, capped at 500)
    pub limit: Option<i64>,
}

/// A signal row shaped for API consumers, context JSON inflated
#[derive(Debug, Serialize)]
pub struct SignalItem {
    pub id: String,
    #[serde(rename = "type")]
    pub signal_type: String,
    pub wallet: String,
    pub vertical: String,
    pub transaction_hash: String,
    pub target_contract: String,
    pub timestamp: String,
    pub actionability_score: i64,
    pub is_first_mover: bool,
    pub vertical_tag: String,
    pub common_neighbors: i64,
    pub display_name: Option<String>,
    pub persona: String,
    pub context: Option<Value>,
    pub detected_at: String,
}

impl From<StoredSignal> for SignalItem {
    fn from(row: StoredSignal) -> Self {
        let context = row
            .context
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        Self {
            id: row.signal_id,
            signal_type: row.signal_type,
            wallet: row.wallet_address,
            vertical: row.vertical,
            transaction_hash: row.transaction_hash,
            target_contract: row.target_contract,
            timestamp: row.block_timestamp,
            actionability_score: row.actionability_score,
            is_first_mover: row.is_first_mover,
            vertical_tag: row.vertical_tag,
            common_neighbors: row.common_neighbors,
            display_name: row.display_name,
            persona: row.persona,
            context,
            detected_at: row.created_at,
        }
    }
}

/// Response for the signals list
#[derive(Debug, Serialize)]
pub struct SignalsResponse {
    pub signals: Vec<SignalItem>,
    pub total: usize,
}

/// List recent signals, newest first
///
/// GET /api/signals
pub async fn list_signals(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<SignalsQuery>,
) -> Result<Json<SignalsResponse>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let rows = db::recent_signals(&state.db, limit).await?;
    let signals: Vec<SignalItem> = rows.into_iter().map(SignalItem::from).collect();
    let total = signals.len();

    Ok(Json(SignalsResponse { signals, total }))
}

// =============================================================================
// STATUS API
// =============================================================================

/// Response for the status endpoint
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub engine: EngineStatus,
    pub api: QueueStats,
    pub signals_stored: i64,
    pub uptime_seconds: i64,
}

/// Engine and provider queue status
///
/// GET /api/status
pub async fn get_status(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<StatusResponse>, AppError> {
    let signals_stored = db::count_signals(&state.db).await?;
    let uptime_seconds = (Utc::now() - state.started_at).num_seconds();

    Ok(Json(StatusResponse {
        engine: state.engine.status(),
        api: state.client.queue_stats(),
        signals_stored,
        uptime_seconds,
    }))
}

// =============================================================================
// WATCHLIST API
// =============================================================================

/// Response for the watchlist
#[derive(Debug, Serialize)]
pub struct WatchlistResponse {
    pub wallets: Vec<WatchlistEntry>,
    pub total: usize,
}

/// List the runtime watchlist
///
/// GET /api/watchlist
pub async fn get_watchlist(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<WatchlistResponse>, AppError> {
    let wallets = db::watchlist(&state.db).await?;
    let total = wallets.len();
    Ok(Json(WatchlistResponse { wallets, total }))
}

/// Request body for watchlist updates
#[derive(Debug, Deserialize)]
pub struct UpdateWatchlistRequest {
    pub address: String,
    /// "add" or "remove"
    pub action: String,
}

/// Response for watchlist updates
#[derive(Debug, Serialize)]
pub struct WatchlistUpdateResponse {
    pub success: bool,
    pub address: String,
    pub action: String,
    /// False when an add hit an existing row or a remove missed
    pub changed: bool,
}

/// Add or remove a watchlist wallet. Changes take effect on the next
/// restart, when the watchlist is merged into the polled roster.
///
/// POST /api/watchlist
pub async fn update_watchlist(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<UpdateWatchlistRequest>,
) -> Result<Json<WatchlistUpdateResponse>, AppError> {
    let address = request.address.to_lowercase();
    if !is_evm_address(&address) {
        return Err(AppError::Validation(format!(
            "Invalid wallet address: {}",
            request.address
        )));
    }

    let changed = match request.action.as_str() {
        "add" => db::watchlist_add(&state.db, &address).await?,
        "remove" => db::watchlist_remove(&state.db, &address).await?,
        other => {
            return Err(AppError::Validation(format!(
                "Unknown watchlist action: {} (expected add or remove)",
                other
            )))
        }
    };

    tracing::info!(address = %address, action = %request.action, changed, "Watchlist updated");

    Ok(Json(WatchlistUpdateResponse {
        success: true,
        address,
        action: request.action,
        changed,
    }))
}

// =============================================================================
// AUDIENCE API
// =============================================================================

/// Request body for audience builds
#[derive(Debug, Deserialize)]
pub struct BuildAudienceRequest {
    pub target_contract: String,
}

/// Response for audience builds and reads
#[derive(Debug, Serialize)]
pub struct AudienceResponse {
    pub target_contract: String,
    pub members: Vec<AudienceMember>,
    pub total: usize,
}

/// Build a lookalike audience for a contract via Explorer SQL and
/// persist it, replacing any previous audience for that contract.
///
/// POST /api/audience
pub async fn build_audience(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<BuildAudienceRequest>,
) -> Result<Json<AudienceResponse>, AppError> {
    let target = request.target_contract.to_lowercase();
    if !is_evm_address(&target) {
        return Err(AppError::Validation(format!(
            "Invalid target contract: {}",
            request.target_contract
        )));
    }

    let sql = lookalike_audience_sql(&target);
    let rows = state.client.run_query(&sql).await?;

    let members: Vec<AudienceMember> = rows
        .iter()
        .filter_map(|row| {
            let wallet_address = row.get("wallet_address")?.as_str()?.to_string();
            let volume_30d_usd = row.get("total_volume_usd").and_then(Value::as_f64);
            Some(AudienceMember {
                wallet_address,
                volume_30d_usd,
            })
        })
        .collect();

    db::save_audience(&state.db, &target, &members).await?;
    tracing::info!(
        target = %target,
        members = members.len(),
        "Lookalike audience built"
    );

    let total = members.len();
    Ok(Json(AudienceResponse {
        target_contract: target,
        members,
        total,
    }))
}

/// Read a previously built audience
///
/// GET /api/audience/:contract
pub async fn get_audience(
    State(state): State<Arc<ApiState>>,
    Path(contract): Path<String>,
) -> Result<Json<AudienceResponse>, AppError> {
    let target = contract.to_lowercase();
    if !is_evm_address(&target) {
        return Err(AppError::Validation(format!(
            "Invalid target contract: {}",
            contract
        )));
    }

    let members = db::audience_for(&state.db, &target).await?;
    if members.is_empty() {
        return Err(AppError::NotFound(format!(
            "No audience stored for {}",
            target
        )));
    }

    let total = members.len();
    Ok(Json(AudienceResponse {
        target_contract: target,
        members,
        total,
    }))
}
