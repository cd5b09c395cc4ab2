//! Health check endpoint for Kubernetes probes and monitoring.

use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;

use super::AppState;

/// Health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Always "healthy": the service only starts once the IdP is loaded
    pub status: String,
    /// Service version
    pub version: String,
    /// Number of registered ACS bindings
    pub bindings: usize,
}

#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        bindings: state.provider.binding_count(),
    })
}
