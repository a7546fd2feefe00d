// handlers/public/health.rs - GET /health

use axum::extract::State;
use serde_json::{json, Value};

use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// Liveness plus a database ping. Always 200 so load balancers can tell "up but degraded".
pub async fn health_get(State(state): State<AppState>) -> ApiResult<Value> {
    let database = match DatabaseManager::health_check(&state.pool).await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Health check database ping failed: {}", e);
            "unreachable"
        }
    };
    Ok(ApiResponse::success(json!({
        "status": if database == "connected" { "ok" } else { "degraded" },
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
