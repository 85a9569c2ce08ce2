//! Basic handlers - health, readiness and version.

use axum::{extract::State, http::StatusCode, Json};

use super::ServerState;
use crate::models::VersionInfo;

/// Liveness probe.
pub async fn liveness_handler() -> &'static str {
    "ok"
}

/// Readiness probe - the store must answer a read.
pub async fn readiness_handler(State(state): State<ServerState>) -> (StatusCode, &'static str) {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(category = "api", error = %e, "readiness_check_failed");
            (StatusCode::SERVICE_UNAVAILABLE, "not ready")
        }
    }
}

pub async fn version_handler() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: option_env!("SMARTHOME_COMMIT").unwrap_or("unknown").to_string(),
        date: option_env!("SMARTHOME_BUILD_DATE")
            .unwrap_or("unknown")
            .to_string(),
    })
}
