//! Token introspection (RFC 7662) and profile responses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cipher::{AccessTokenCipher, looks_like_jwt};
use crate::types::{AccessToken, RefreshToken, join_scopes};

/// Introspection response.
///
/// Inactive tokens carry only `active: false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// `access_token` or `refresh_token`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl IntrospectionResponse {
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_access_token(token: &AccessToken) -> Self {
        Self {
            active: true,
            scope: Some(join_scopes(&token.scopes)),
            client_id: Some(token.client_id.clone()),
            exp: Some(token.expires_at.unix_timestamp()),
            iat: Some(token.created_at.unix_timestamp()),
            sub: Some(token.authentication.principal.id.clone()),
            token_type: Some("access_token".to_string()),
            jti: Some(token.id.clone()),
        }
    }

    #[must_use]
    pub fn for_refresh_token(token: &RefreshToken) -> Self {
        Self {
            active: true,
            scope: Some(join_scopes(&token.scopes)),
            client_id: Some(token.client_id.clone()),
            exp: Some(token.expires_at.unix_timestamp()),
            iat: Some(token.created_at.unix_timestamp()),
            sub: Some(token.authentication.principal.id.clone()),
            token_type: Some("refresh_token".to_string()),
            jti: Some(token.id.clone()),
        }
    }
}

/// The user profile returned for a bearer access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: String,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub client_id: String,
    pub service: String,
}

impl From<&AccessToken> for ProfileResponse {
    fn from(token: &AccessToken) -> Self {
        Self {
            id: token.authentication.principal.id.clone(),
            attributes: token.authentication.principal.attributes.clone(),
            client_id: token.client_id.clone(),
            service: token.service.id.clone(),
        }
    }
}

/// Maps a presented token to its ticket id.
///
/// JWT and JWE tokens resolve to their `jti` once the signature checks out;
/// anything else is taken as the raw id. Returns `None` for a JWT that fails
/// verification.
#[must_use]
pub fn resolve_token_id(cipher: Option<&AccessTokenCipher>, token: &str) -> Option<String> {
    if !looks_like_jwt(token) {
        return Some(token.to_string());
    }
    let cipher = cipher?;
    match cipher.decode(token) {
        Ok(claims) => Some(claims.jti),
        Err(e) => {
            debug!(error = %e, "Presented JWT failed verification");
            None
        }
    }
}
