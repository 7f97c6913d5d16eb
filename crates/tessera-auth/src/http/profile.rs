//! Bearer token profile endpoint.
//!
//! ```text
//! GET /oauth2.0/profile
//! Authorization: Bearer <access_token>
//! ```

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};

use super::{OAuthState, authorization, error_response, no_store, parse_bearer};
use crate::error::AuthError;

/// Returns `{id, attributes, client_id, service}` for a live access token,
/// or `401 invalid_token`.
pub async fn profile_handler(State(state): State<OAuthState>, headers: HeaderMap) -> Response {
    let Some(token) = authorization(&headers).and_then(parse_bearer) else {
        return error_response(&AuthError::invalid_token("bearer token is required"));
    };
    match state.engine.profile(token).await {
        Ok(profile) => no_store(StatusCode::OK, profile),
        Err(e) => error_response(&e),
    }
}
