//! The login form and SAML assertion consumer endpoint.

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, Method};

use super::AppState;
use crate::auth::AuthenticationResponse;

/// Serves the login form on GET and consumes IdP-initiated POSTs.
#[tracing::instrument(name = "saml.authenticate", skip_all, fields(method = %method))]
pub async fn authenticate(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let AuthenticationResponse { outcome, response } =
        state.provider.authenticate(&method, &headers, &body);

    tracing::debug!(authenticated = outcome.is_authenticated(), "Login form served");
    response.into_response()
}
