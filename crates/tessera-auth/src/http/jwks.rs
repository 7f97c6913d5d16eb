//! Verification keys for JWT access tokens.

use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};

use super::OAuthState;

/// Handler for `GET /oauth2.0/jwks`.
///
/// An empty key set is returned when tokens are never signed.
pub async fn jwks_handler(State(state): State<OAuthState>) -> impl IntoResponse {
    let jwks = state.engine.jwks().unwrap_or_default();
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(jwks),
    )
}
