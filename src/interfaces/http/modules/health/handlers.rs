//! Health check handler

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use serde::Serialize;
use tracing::warn;

use crate::infrastructure::storage::AvatarStore;

/// Health check state
#[derive(Clone)]
pub struct HealthState {
    pub db: DatabaseConnection,
    pub avatars: AvatarStore,
    pub started_at: Arc<Instant>,
}

/// Service health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: ComponentHealth,
    pub avatar_storage: ComponentHealth,
}

/// Component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn ok(latency_ms: Option<u64>) -> Self {
        Self {
            status: "ok".to_string(),
            latency_ms,
        }
    }

    fn error() -> Self {
        Self {
            status: "error".to_string(),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// `GET /health`
pub async fn health_check(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let uptime = state.started_at.elapsed().as_secs();

    let db_start = Instant::now();
    let database = match state
        .db
        .execute(Statement::from_string(
            state.db.get_database_backend(),
            "SELECT 1".to_string(),
        ))
        .await
    {
        Ok(_) => ComponentHealth::ok(Some(db_start.elapsed().as_millis() as u64)),
        Err(e) => {
            warn!(error = %e, "Health check: database ping failed");
            ComponentHealth::error()
        }
    };

    // The avatar directory is created lazily, so only an unreadable path counts.
    let avatar_storage = match tokio::fs::metadata(&state.avatars.config().directory).await {
        Ok(meta) if meta.is_dir() => ComponentHealth::ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ComponentHealth::ok(None),
        _ => ComponentHealth::error(),
    };

    let healthy = database.is_ok() && avatar_storage.is_ok();
    let (http_status, status) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
            database,
            avatar_storage,
        }),
    )
}
