//! Health endpoints for liveness probes and operators

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::db::DbPool;

use super::api::ApiState;

/// Aggregate health report
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub uptime_seconds: i64,
    pub engine_running: bool,
    pub queue_depth: u64,
    pub database: ComponentHealth,
}

/// Coarse states reported per component and overall
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// One component's state plus an optional failure message
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    fn unhealthy(message: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message),
        }
    }

    /// Ping the database with the cheapest possible query.
    async fn of_database(pool: &DbPool) -> Self {
        match sqlx::query("SELECT 1").fetch_one(pool).await {
            Ok(_) => Self::healthy(),
            Err(e) => {
                tracing::error!(error = %e, "Database health check failed");
                Self::unhealthy(e.to_string())
            }
        }
    }
}

/// Full health report
///
/// GET /health
///
/// A stopped engine degrades the report but keeps the HTTP status at
/// 200: reads still work and load balancers should not yank the node.
pub async fn health_check(
    State(state): State<Arc<ApiState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = ComponentHealth::of_database(&state.db).await;
    let engine_running = state.engine.is_running();

    let status = if database.status == HealthStatus::Unhealthy {
        HealthStatus::Unhealthy
    } else if !engine_running {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let report = HealthResponse {
        status,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        engine_running,
        queue_depth: state.client.queue_stats().depth,
        database,
    };
    (code, Json(report))
}

/// Bare liveness probe
///
/// GET /healthz
pub async fn health_simple() -> StatusCode {
    StatusCode::OK
}
