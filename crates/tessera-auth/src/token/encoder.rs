//! Wire encoding of generated tokens.

use std::sync::Arc;

use time::OffsetDateTime;

use super::cipher::AccessTokenCipher;
use super::generator::GeneratedTokens;
use super::jwt::AccessTokenClaims;
use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::{DeviceAuthorizationResponse, TokenEndpointResponse, TokenResponse};
use crate::types::{AccessToken, RegisteredClient, join_scopes};

/// Renders [`GeneratedTokens`] as a token endpoint response.
///
/// Lifetimes are read from the tickets; the encoder never computes its own.
#[derive(Clone)]
pub struct ResponseEncoder {
    cipher: Option<Arc<AccessTokenCipher>>,
    verification_uri: String,
}

impl ResponseEncoder {
    /// `cipher` is needed only when some client opts into JWT access tokens.
    #[must_use]
    pub fn new(cipher: Option<Arc<AccessTokenCipher>>, verification_uri: impl Into<String>) -> Self {
        Self {
            cipher,
            verification_uri: verification_uri.into(),
        }
    }

    /// Encodes the generated tokens for `client`.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the client wants JWT access tokens and no
    /// cipher is configured, or signing fails.
    pub fn encode(
        &self,
        client: &RegisteredClient,
        generated: GeneratedTokens,
    ) -> AuthResult<TokenEndpointResponse> {
        match generated {
            GeneratedTokens::Device {
                device_token,
                interval,
            } => Ok(TokenEndpointResponse::Device(DeviceAuthorizationResponse {
                verification_uri: self.verification_uri.clone(),
                expires_in: seconds_between(device_token.created_at, device_token.expires_at),
                user_code: device_token.user_code,
                device_code: device_token.id,
                interval: interval.as_secs(),
            })),
            GeneratedTokens::Tokens {
                access_token,
                refresh_token,
            } => {
                let expires_in = seconds_between(access_token.created_at, access_token.expires_at);
                let scope = join_scopes(&access_token.scopes);
                let value = if client.jwt_access_token {
                    self.encode_jwt(&access_token)?
                } else {
                    access_token.id
                };
                let mut response = TokenResponse::new(value, expires_in, scope);
                if let Some(refresh_token) = refresh_token {
                    response = response.with_refresh_token(refresh_token.id);
                }
                Ok(TokenEndpointResponse::Token(response))
            }
        }
    }

    /// Signs (and encrypts, if configured) the access token as a JWT whose
    /// `jti` is the ticket id.
    ///
    /// # Errors
    ///
    /// Returns `server_error` without a cipher or when signing fails.
    pub fn encode_jwt(&self, token: &AccessToken) -> AuthResult<String> {
        let cipher = self
            .cipher
            .as_ref()
            .ok_or_else(|| AuthError::configuration("JWT access tokens need a signing key"))?;
        Ok(cipher.encode(&claims_for(cipher.issuer(), token))?)
    }
}

/// The claim set for an access token ticket.
#[must_use]
pub fn claims_for(issuer: &str, token: &AccessToken) -> AccessTokenClaims {
    let principal = &token.authentication.principal;
    AccessTokenClaims {
        iss: issuer.to_string(),
        aud: token.service.id.clone(),
        iat: token.authentication.authenticated_at.unix_timestamp(),
        exp: token.expires_at.unix_timestamp(),
        jti: token.id.clone(),
        sub: principal.id.clone(),
        client_id: token.client_id.clone(),
        scope: join_scopes(&token.scopes),
        attributes: Default::default(),
    }
    .with_attributes(&principal.attributes)
}

fn seconds_between(from: OffsetDateTime, to: OffsetDateTime) -> u64 {
    u64::try_from((to - from).whole_seconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::token::jwt::{JwtService, SigningAlgorithm, SigningKeyPair};
    use crate::types::{Authentication, RefreshToken, Service};

    fn access_token() -> AccessToken {
        let now = OffsetDateTime::now_utc();
        let attributes = BTreeMap::from([
            ("email".to_string(), serde_json::json!("alice@example.com")),
            ("sub".to_string(), serde_json::json!("mallory")),
        ]);
        AccessToken {
            id: "AT-1".into(),
            client_id: "app".into(),
            service: Service::new("https://app.example.com/cb"),
            authentication: Authentication::new("alice", attributes),
            scopes: BTreeSet::from(["openid".to_string(), "profile".to_string()]),
            refresh_token_id: None,
            ticket_granting_ticket: None,
            created_at: now,
            expires_at: now + time::Duration::hours(2),
        }
    }

    fn cipher() -> Arc<AccessTokenCipher> {
        let key = SigningKeyPair::generate_rsa(SigningAlgorithm::RS256).unwrap();
        Arc::new(AccessTokenCipher::new(
            JwtService::new(key, "https://sso.example.com"),
            None,
        ))
    }

    #[test]
    fn test_opaque_token_response() {
        let encoder = ResponseEncoder::new(None, "https://sso.example.com/oauth2.0/device");
        let token = access_token();
        let now = token.created_at;
        let refresh = RefreshToken {
            id: "RT-1".into(),
            client_id: "app".into(),
            service: token.service.clone(),
            authentication: token.authentication.clone(),
            scopes: token.scopes.clone(),
            ticket_granting_ticket: None,
            created_at: now,
            expires_at: now + time::Duration::days(30),
        };
        let response = encoder
            .encode(
                &RegisteredClient::new("app", "https://app\\.example\\.com/.*"),
                GeneratedTokens::Tokens {
                    access_token: token,
                    refresh_token: Some(refresh),
                },
            )
            .unwrap();

        let TokenEndpointResponse::Token(response) = response else {
            panic!("expected a token response");
        };
        assert_eq!(response.access_token, "AT-1");
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 7200);
        assert_eq!(response.scope, "openid profile");
        assert_eq!(response.refresh_token.as_deref(), Some("RT-1"));
    }

    #[test]
    fn test_jwt_token_keeps_ticket_id_as_jti() {
        let cipher = cipher();
        let encoder = ResponseEncoder::new(Some(cipher.clone()), "https://sso.example.com/device");
        let mut client = RegisteredClient::new("app", "https://app\\.example\\.com/.*");
        client.jwt_access_token = true;

        let response = encoder
            .encode(
                &client,
                GeneratedTokens::Tokens {
                    access_token: access_token(),
                    refresh_token: None,
                },
            )
            .unwrap();
        let TokenEndpointResponse::Token(response) = response else {
            panic!("expected a token response");
        };
        assert_ne!(response.access_token, "AT-1");

        let claims = cipher.decode(&response.access_token).unwrap();
        assert_eq!(claims.jti, "AT-1");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.aud, "https://app.example.com/cb");
        assert_eq!(claims.scope, "openid profile");
        assert_eq!(
            claims.attributes.get("email"),
            Some(&serde_json::json!("alice@example.com"))
        );
    }

    #[test]
    fn test_jwt_without_cipher_is_server_error() {
        let encoder = ResponseEncoder::new(None, "https://sso.example.com/device");
        let err = encoder.encode_jwt(&access_token()).unwrap_err();
        assert!(err.is_server_error());
    }

    #[test]
    fn test_device_response() {
        let encoder = ResponseEncoder::new(None, "https://sso.example.com/oauth2.0/device");
        let now = OffsetDateTime::now_utc();
        let device_token = crate::types::DeviceToken {
            id: "ODT-1".into(),
            user_code: "BCDFGHJK".into(),
            client_id: "cli".into(),
            service: Service::new("urn:cli"),
            scopes: BTreeSet::new(),
            approved: false,
            authentication: None,
            last_polled_at: None,
            created_at: now,
            expires_at: now + time::Duration::minutes(5),
        };
        let response = encoder
            .encode(
                &RegisteredClient::new("cli", "urn:cli"),
                GeneratedTokens::Device {
                    device_token,
                    interval: std::time::Duration::from_secs(15),
                },
            )
            .unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["verification_uri"], "https://sso.example.com/oauth2.0/device");
        assert_eq!(json["expires_in"], 300);
        assert_eq!(json["user_code"], "BCDFGHJK");
        assert_eq!(json["device_code"], "ODT-1");
        assert_eq!(json["interval"], 15);
    }
}
