//! Token revocation endpoint handler (RFC 7009).
//!
//! ```text
//! POST /oauth2.0/revoke
//! Authorization: Basic <client_credentials>
//!
//! token=<token_to_revoke>&token_type_hint=refresh_token
//! ```
//!
//! The endpoint answers 200 OK for unknown tokens and tokens of other
//! clients; only client authentication failures are reported.

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::warn;

use super::{OAuthState, client_credentials, error_response};
use crate::error::AuthError;

/// Form parameters for the revocation endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RevocationForm {
    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub token_type_hint: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,
}

/// # Response
///
/// - 200 OK: revoked, or nothing to revoke
/// - 400 Bad Request: missing token
/// - 401 Unauthorized: invalid client credentials
pub async fn revoke_handler(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    Form(form): Form<RevocationForm>,
) -> Response {
    if form.token.is_empty() {
        return error_response(&AuthError::invalid_request(
            "Missing required 'token' parameter",
        ));
    }
    let credentials = match client_credentials(&headers, form.client_id, form.client_secret) {
        Ok(credentials) => credentials,
        Err(e) => return error_response(&e),
    };

    match state.engine.revoke(&credentials, &form.token).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) if matches!(e, AuthError::InvalidClient { .. }) => error_response(&e),
        Err(e) => {
            warn!(
                client_id = ?credentials.client_id,
                error = %e,
                "Token revocation failed, answering 200"
            );
            StatusCode::OK.into_response()
        }
    }
}
