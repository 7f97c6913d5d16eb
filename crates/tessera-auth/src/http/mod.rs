//! HTTP handlers for the OAuth 2.0 endpoints.
//!
//! [`router`] wires every handler onto one [`OAuthState`]; the server nests
//! it under `/oauth2.0`.
//!
//! # Available Handlers
//!
//! - [`token`] - token endpoint (`/token`, `/accessToken`)
//! - [`device`] - device authorization and user approval
//! - [`introspect`] - token introspection (RFC 7662)
//! - [`profile`] - bearer token profile
//! - [`revoke`] - token revocation (RFC 7009)
//! - [`jwks`] - verification keys

pub mod device;
pub mod introspect;
pub mod jwks;
pub mod profile;
pub mod revoke;
pub mod token;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::engine::{ClientCredentials, TokenEngine};
use crate::error::AuthError;
use crate::oauth::TokenError;

pub use device::{device_approve_handler, device_authorization_handler};
pub use introspect::introspect_handler;
pub use jwks::jwks_handler;
pub use profile::profile_handler;
pub use revoke::revoke_handler;
pub use token::token_handler;

/// Shared state of the OAuth endpoints.
#[derive(Clone)]
pub struct OAuthState {
    pub engine: Arc<TokenEngine>,
}

impl OAuthState {
    pub fn new(engine: Arc<TokenEngine>) -> Self {
        Self { engine }
    }
}

/// Routes for every OAuth endpoint, relative to the mount point.
pub fn router(state: OAuthState) -> Router {
    Router::new()
        .route("/token", post(token_handler))
        .route("/accessToken", post(token_handler))
        .route("/device", post(device_authorization_handler))
        .route("/device/approve", post(device_approve_handler))
        .route("/introspect", post(introspect_handler))
        .route("/profile", get(profile_handler))
        .route("/revoke", post(revoke_handler))
        .route("/jwks", get(jwks_handler))
        .with_state(state)
}

/// Parses an `Authorization: Basic` header value into `(id, secret)`.
///
/// Returns `None` for any other scheme or malformed credentials.
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let encoded = header_value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    // the secret may contain colons
    let (id, secret) = credentials.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

/// Parses an `Authorization: Bearer` header value.
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    let token = header_value.trim().strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

fn basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    authorization(headers).and_then(parse_basic_auth)
}

/// Client credentials from the Basic header, falling back to the form body.
///
/// # Errors
///
/// `invalid_request` if the header and the body name different clients.
fn client_credentials(
    headers: &HeaderMap,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> Result<ClientCredentials, AuthError> {
    match basic_auth(headers) {
        Some((id, secret)) => {
            if client_id.as_deref().is_some_and(|body_id| body_id != id) {
                return Err(AuthError::invalid_request(
                    "client_id in body does not match Authorization header",
                ));
            }
            Ok(ClientCredentials {
                client_id: Some(id),
                client_secret: Some(secret),
            })
        }
        None => Ok(ClientCredentials {
            client_id,
            client_secret,
        }),
    }
}

/// A JSON body that must not be cached.
fn no_store<T: Serialize>(status: StatusCode, body: T) -> Response {
    (
        status,
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(body),
    )
        .into_response()
}

/// Renders an error as the OAuth error body with its HTTP status.
pub fn error_response(error: &AuthError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = no_store(status, TokenError::from(error));
    if status == StatusCode::UNAUTHORIZED {
        let challenge = match error {
            AuthError::InvalidToken { .. } => "Bearer",
            _ => "Basic",
        };
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static(challenge));
    }
    response
}
