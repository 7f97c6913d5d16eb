//! Token endpoint handler.
//!
//! # Request Format
//!
//! ```text
//! POST /oauth2.0/token
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <client_credentials>
//!
//! grant_type=authorization_code&code=OC-...&redirect_uri=...
//! ```
//!
//! Every grant, including device polling and implicit response types, goes
//! through [`TokenEngine::handle`](crate::engine::TokenEngine::handle).

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};

use super::{OAuthState, basic_auth, error_response, no_store};
use crate::AuthResult;
use crate::oauth::{TokenEndpointResponse, TokenRequest};

/// Merges Basic credentials into the form and runs the pipeline.
pub(super) async fn issue(
    state: &OAuthState,
    headers: &HeaderMap,
    request: TokenRequest,
) -> AuthResult<TokenEndpointResponse> {
    let request = match basic_auth(headers) {
        Some((client_id, client_secret)) => {
            request.with_basic_credentials(client_id, client_secret)?
        }
        None => request,
    };
    state.engine.handle(request).await
}

/// OAuth 2.0 token endpoint.
///
/// # Response
///
/// - 200 OK: token response, or device authorization response
/// - 400 Bad Request: OAuth error, including `authorization_pending` and `slow_down`
/// - 401 Unauthorized: `invalid_client`
/// - 500: store or signing failure
pub async fn token_handler(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    match issue(&state, &headers, request).await {
        Ok(response) => no_store(StatusCode::OK, response),
        Err(e) => error_response(&e),
    }
}
