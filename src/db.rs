//! SQLite persistence
//!
//! WAL-mode pool plus the handful of queries the service needs: signal
//! archival with hash-level dedup, the runtime watchlist and stored
//! lookalike audiences.

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::models::Signal;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Type alias for the SQLite connection pool
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool
pub async fn init_pool(config: &DatabaseConfig) -> AppResult<DbPool> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            info!(path = %parent.display(), "Created database directory");
        }
    }

    let db_url = format!("sqlite:{}?mode=rwc", config.path.display());

    let connect_options = SqliteConnectOptions::from_str(&db_url)
        .map_err(AppError::Database)?
        // WAL keeps the API readable while the consumer writes
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5))
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(connect_options)
        .await?;

    info!(
        path = %config.path.display(),
        max_connections = config.max_connections,
        "Database pool initialized"
    );

    Ok(pool)
}

/// Apply the schema file statement by statement.
///
/// SQLite rejects multi-statement queries, so the file is split on ';'.
/// A missing file is only a warning so tests and ad-hoc runs can rely
/// on an already-provisioned database.
pub async fn run_migrations(pool: &DbPool) -> AppResult<()> {
    run_migrations_from(pool, Path::new("database/schema.sql")).await
}

pub async fn run_migrations_from(pool: &DbPool, schema_path: &Path) -> AppResult<()> {
    if !schema_path.exists() {
        warn!(path = %schema_path.display(), "Schema file not found, skipping migrations");
        return Ok(());
    }

    let schema = std::fs::read_to_string(schema_path)?;

    for statement in schema.split(';') {
        // Comment lines may precede a statement within one chunk
        let stmt: String = statement
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }

        if let Err(e) = sqlx::query(stmt).execute(pool).await {
            if e.to_string().contains("already exists") {
                warn!(error = %e, "Schema object already exists, skipping");
            } else {
                return Err(e.into());
            }
        }
    }

    info!("Database schema applied");
    Ok(())
}

// =============================================================================
// SIGNALS
// =============================================================================

/// A persisted signal row, as served by the signals endpoint
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredSignal {
    pub signal_id: String,
    pub signal_type: String,
    pub wallet_address: String,
    pub vertical: String,
    pub transaction_hash: String,
    pub target_contract: String,
    pub block_timestamp: String,
    pub actionability_score: i64,
    pub is_first_mover: bool,
    pub vertical_tag: String,
    pub common_neighbors: i64,
    pub display_name: Option<String>,
    pub persona: String,
    /// Context JSON as emitted (wallet label, protocol, tokens, method)
    pub context: Option<String>,
    pub created_at: String,
}

/// Archive a signal unless its transaction hash is already stored.
///
/// Returns true when a row was written, false on a duplicate.
pub async fn insert_signal_if_new(pool: &DbPool, signal: &Signal) -> AppResult<bool> {
    let context = serde_json::to_string(&signal.context)
        .map_err(|e| AppError::Internal(format!("Failed to serialize signal context: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO signals (
            signal_id, signal_type, wallet_address, vertical,
            transaction_hash, target_contract, block_timestamp,
            actionability_score, is_first_mover, vertical_tag,
            common_neighbors, display_name, persona, context
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&signal.id)
    .bind(signal.kind.to_string())
    .bind(&signal.wallet)
    .bind(signal.vertical.as_str())
    .bind(&signal.transaction_hash)
    .bind(&signal.target_contract)
    .bind(&signal.timestamp)
    .bind(signal.actionability_score as i64)
    .bind(if signal.is_first_mover { 1 } else { 0 })
    .bind(&signal.vertical_tag)
    .bind(signal.common_neighbors as i64)
    .bind(&signal.display_name)
    .bind(&signal.persona)
    .bind(context)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Most recent archived signals, newest first.
pub async fn recent_signals(pool: &DbPool, limit: i64) -> AppResult<Vec<StoredSignal>> {
    let rows = sqlx::query_as::<_, StoredSignal>(
        r#"
        SELECT signal_id, signal_type, wallet_address, vertical,
               transaction_hash, target_contract, block_timestamp,
               actionability_score, is_first_mover, vertical_tag,
               common_neighbors, display_name, persona, context, created_at
        FROM signals
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Total archived signals.
pub async fn count_signals(pool: &DbPool) -> AppResult<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM signals")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

// =============================================================================
// WATCHLIST
// =============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WatchlistEntry {
    pub address: String,
    pub added_at: String,
}

/// Add a wallet to the runtime watchlist. Returns false if already present.
pub async fn watchlist_add(pool: &DbPool, address: &str) -> AppResult<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO watchlist (address) VALUES (?)")
        .bind(address.to_lowercase())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove a wallet from the watchlist. Returns false if it was not there.
pub async fn watchlist_remove(pool: &DbPool, address: &str) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM watchlist WHERE address = ?")
        .bind(address.to_lowercase())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Full watchlist, oldest entry first.
pub async fn watchlist(pool: &DbPool) -> AppResult<Vec<WatchlistEntry>> {
    let rows = sqlx::query_as::<_, WatchlistEntry>(
        "SELECT address, added_at FROM watchlist ORDER BY added_at ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// =============================================================================
// TARGET AUDIENCES
// =============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AudienceMember {
    pub wallet_address: String,
    pub volume_30d_usd: Option<f64>,
}

/// Replace the stored audience for a contract with freshly queried rows.
pub async fn save_audience(
    pool: &DbPool,
    target_contract: &str,
    members: &[AudienceMember],
) -> AppResult<usize> {
    let target = target_contract.to_lowercase();

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM target_audiences WHERE target_contract = ?")
        .bind(&target)
        .execute(&mut *tx)
        .await?;

    for member in members {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO target_audiences (target_contract, wallet_address, volume_30d_usd)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&target)
        .bind(member.wallet_address.to_lowercase())
        .bind(member.volume_30d_usd)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(members.len())
}

/// Stored audience for a contract, largest wallets first.
pub async fn audience_for(pool: &DbPool, target_contract: &str) -> AppResult<Vec<AudienceMember>> {
    let rows = sqlx::query_as::<_, AudienceMember>(
        r#"
        SELECT wallet_address, volume_30d_usd
        FROM target_audiences
        WHERE target_contract = ?
        ORDER BY volume_30d_usd DESC
        "#,
    )
    .bind(target_contract.to_lowercase())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
