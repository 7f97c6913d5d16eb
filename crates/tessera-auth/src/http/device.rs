//! Device authorization (RFC 8628) and user approval handlers.
//!
//! ```text
//! POST /oauth2.0/device
//! client_id=tv&scope=openid
//!
//! POST /oauth2.0/device/approve
//! Authorization: Basic <user_credentials>
//! user_code=BCDFGHJK
//! ```
//!
//! The device then polls the token endpoint with
//! `grant_type=urn:ietf:params:oauth:grant-type:device_code`.

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

use super::{OAuthState, basic_auth, error_response, no_store, token::issue};
use crate::error::AuthError;
use crate::oauth::TokenRequest;
use crate::types::ResponseType;

/// Starts a device flow. `response_type` defaults to `device_code`.
pub async fn device_authorization_handler(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    Form(mut request): Form<TokenRequest>,
) -> Response {
    request
        .response_type
        .get_or_insert_with(|| ResponseType::DeviceCode.as_str().to_string());
    match issue(&state, &headers, request).await {
        Ok(response) => no_store(StatusCode::OK, response),
        Err(e) => error_response(&e),
    }
}

/// Form parameters for device approval.
#[derive(Debug, Deserialize)]
pub struct DeviceApprovalForm {
    #[serde(default)]
    pub user_code: String,
}

/// Approves a pending device authorization for the Basic-authenticated user.
///
/// # Response
///
/// - 204 No Content: approved
/// - 400 Bad Request: `invalid_grant` for bad credentials or an unknown code,
///   `invalid_request` for a missing or already approved code
pub async fn device_approve_handler(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    Form(form): Form<DeviceApprovalForm>,
) -> Response {
    if form.user_code.is_empty() {
        return error_response(&AuthError::invalid_request("user_code is required"));
    }
    let Some((username, password)) = basic_auth(&headers) else {
        return error_response(&AuthError::invalid_request("user credentials are required"));
    };

    match state
        .engine
        .approve_device(form.user_code.trim(), &username, &password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            debug!(error = %e, "Device approval failed");
            error_response(&e)
        }
    }
}
