use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::api::middleware::session::AppState;
use crate::db::PassStore;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub store: StoreHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreHealth {
    pub backend: String,
    pub status: String,
    pub response_time_ms: u128,
    pub active_passes: usize,
    pub total_passes: usize,
    pub snapshot_version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check endpoint
/// Returns 200 if the pass store answers, 503 otherwise
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = check_store(state.store.as_ref()).await;
    let healthy = store.status == "healthy";

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store,
    };

    tracing::debug!(
        status = %response.status,
        duration_ms = response.store.response_time_ms,
        "Health check completed"
    );

    (status_code, Json(response))
}

async fn check_store(store: &dyn PassStore) -> StoreHealth {
    let start = Instant::now();
    let snapshot = store.snapshot();

    let (status, error) = match store.ping().await {
        Ok(()) => ("healthy", None),
        Err(e) => ("unhealthy", Some(format!("Store error: {}", e))),
    };

    StoreHealth {
        backend: store.backend().to_string(),
        status: status.to_string(),
        response_time_ms: start.elapsed().as_millis(),
        active_passes: snapshot.active_count(),
        total_passes: snapshot.len(),
        snapshot_version: snapshot.version,
        error,
    }
}
