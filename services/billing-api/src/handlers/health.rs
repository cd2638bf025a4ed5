//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub catalog: &'static str,
}

/// Liveness check - always returns OK if the service is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check - checks database connectivity and that the catalog
/// has a free plan to fall back to
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    if let Err(e) = sqlx::query("SELECT 1").execute(&state.pool).await {
        tracing::error!(error = ?e, "Database health check failed");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    match state.billing.catalog().free_plan().await {
        Ok(_) => Ok(Json(ReadyResponse {
            status: "ready",
            database: "connected",
            catalog: "ok",
        })),
        Err(e) => {
            tracing::error!(error = %e, "Plan catalog is not usable");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
