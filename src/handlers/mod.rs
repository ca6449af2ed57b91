pub mod contributions;
pub mod fees;
pub mod members;
pub mod orders;
pub mod savings;

use crate::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub storage: String,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let storage_ok = state.storage.is_reachable().await;

    let health_response = HealthStatus {
        status: if storage_ok {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: state.storage.name().to_string(),
    };

    // Return 503 if storage is down, 200 otherwise
    let status_code = if storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}
