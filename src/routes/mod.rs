pub mod auth;
pub mod health;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    auth::SamlAuthProvider,
    config::{AppConfig, HEALTH_PATH},
};

/// Shared, read-only request state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub provider: Arc<SamlAuthProvider>,
}

impl AppState {
    pub fn new(provider: SamlAuthProvider) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }
}

/// Mount the authentication endpoint and the health check.
pub fn build_app(config: &AppConfig, state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health::health_check))
        .route(
            &config.saml.auth_url_path,
            get(auth::authenticate).post(auth::authenticate),
        )
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}
