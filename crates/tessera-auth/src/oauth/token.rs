//! Token endpoint wire types.
//!
//! [`TokenRequest`] is the raw form body of a token, device or implicit
//! request. Extractors turn it into a [`GrantRequest`](crate::types::GrantRequest).
//! The response types are what the encoder produces.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::types::{Authentication, SsoSession};

/// Raw token endpoint parameters.
///
/// Which fields are required depends on `grant_type` / `response_type`:
///
/// - `authorization_code`: code, redirect_uri, optional code_verifier
/// - `refresh_token`: refresh_token, optional scope
/// - `password`: username, password
/// - `client_credentials`: nothing beyond client authentication
/// - device polling: device_code
/// - `response_type=device_code`: client_id, optional scope
///
/// # Client Authentication
///
/// Credentials come from the HTTP Basic header (merged in by the handler via
/// [`with_basic_credentials`](Self::with_basic_credentials)) or from
/// `client_id` + `client_secret` in the body.
#[derive(Clone, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: Option<String>,

    #[serde(default)]
    pub response_type: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Explicit service id; takes precedence over `redirect_uri`.
    #[serde(default)]
    pub service: Option<String>,

    #[serde(default)]
    pub code_verifier: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub device_code: Option<String>,

    /// Upstream authentication established by the login broker.
    /// Never read from the wire.
    #[serde(skip)]
    pub authentication: Option<Authentication>,

    /// The SSO session backing an upstream authentication.
    #[serde(skip)]
    pub ticket_granting_ticket: Option<SsoSession>,
}

impl TokenRequest {
    /// Creates a request for a grant type.
    #[must_use]
    pub fn grant(grant_type: impl Into<String>) -> Self {
        Self {
            grant_type: Some(grant_type.into()),
            ..Self::default()
        }
    }

    /// Creates a request for a response type.
    #[must_use]
    pub fn response(response_type: impl Into<String>) -> Self {
        Self {
            response_type: Some(response_type.into()),
            ..Self::default()
        }
    }

    /// Merges HTTP Basic client credentials into the request.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` if the body names a different client.
    pub fn with_basic_credentials(
        mut self,
        client_id: String,
        client_secret: String,
    ) -> Result<Self, AuthError> {
        if self
            .client_id
            .as_deref()
            .is_some_and(|body_id| body_id != client_id)
        {
            return Err(AuthError::invalid_request(
                "client_id in body does not match Authorization header",
            ));
        }
        self.client_id = Some(client_id);
        self.client_secret = Some(client_secret);
        Ok(self)
    }
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("grant_type", &self.grant_type)
            .field("response_type", &self.response_type)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("service", &self.service)
            .field("scope", &self.scope)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Successful token response.
///
/// ```json
/// {
///   "access_token": "AT-...",
///   "token_type": "Bearer",
///   "expires_in": 7200,
///   "scope": "openid profile",
///   "refresh_token": "RT-..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Raw ticket id or an encoded JWT.
    pub access_token: String,
    /// Always "Bearer".
    pub token_type: String,
    pub expires_in: u64,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            refresh_token: None,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }
}

/// Device authorization response (RFC 8628 section 3.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAuthorizationResponse {
    pub verification_uri: String,
    pub expires_in: u64,
    pub user_code: String,
    pub device_code: String,
    /// Minimum polling interval in seconds.
    pub interval: u64,
}

/// Either shape the token pipeline can answer with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TokenEndpointResponse {
    Token(TokenResponse),
    Device(DeviceAuthorizationResponse),
}

/// OAuth 2.0 error response body.
///
/// ```json
/// {
///   "error": "invalid_grant",
///   "error_description": "Invalid grant: code expired"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl From<&AuthError> for TokenError {
    fn from(err: &AuthError) -> Self {
        Self {
            error: err.oauth_error_code().to_string(),
            error_description: Some(err.public_description()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_request_form_parsing() {
        let body = "grant_type=authorization_code&code=OC-1&redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb&client_id=app";
        let request = parse_form(body);
        assert_eq!(request.grant_type.as_deref(), Some("authorization_code"));
        assert_eq!(request.code.as_deref(), Some("OC-1"));
        assert_eq!(
            request.redirect_uri.as_deref(),
            Some("https://app.example.com/cb")
        );
        assert!(request.authentication.is_none());
    }

    fn parse_form(body: &str) -> TokenRequest {
        let pairs: serde_json::Map<String, serde_json::Value> =
            url::form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
                .collect();
        serde_json::from_value(serde_json::Value::Object(pairs)).unwrap()
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut request = TokenRequest::grant("password");
        request.client_secret = Some("client-secret".into());
        request.password = Some("hunter2".into());
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("client-secret"));
    }

    #[test]
    fn test_basic_credentials_merge() {
        let request = TokenRequest::grant("client_credentials")
            .with_basic_credentials("app".into(), "secret".into())
            .unwrap();
        assert_eq!(request.client_id.as_deref(), Some("app"));
        assert_eq!(request.client_secret.as_deref(), Some("secret"));

        let mut request = TokenRequest::grant("client_credentials");
        request.client_id = Some("other".into());
        let err = request
            .with_basic_credentials("app".into(), "secret".into())
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
    }

    #[test]
    fn test_token_response_serialization() {
        let response = TokenResponse::new("AT-1".into(), 3600, "openid".into());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["token_type"], "Bearer");
        assert!(json.get("refresh_token").is_none());

        let json =
            serde_json::to_value(response.with_refresh_token("RT-1".into())).unwrap();
        assert_eq!(json["refresh_token"], "RT-1");
    }

    #[test]
    fn test_endpoint_response_is_untagged() {
        let response = TokenEndpointResponse::Device(DeviceAuthorizationResponse {
            verification_uri: "https://sso.example.com/oauth2.0/device".into(),
            expires_in: 300,
            user_code: "BCDFGHJK".into(),
            device_code: "ODT-1".into(),
            interval: 15,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["user_code"], "BCDFGHJK");
        assert!(json.get("Device").is_none());
    }

    #[test]
    fn test_token_error_from_auth_error() {
        let error = TokenError::from(&AuthError::SlowDown);
        assert_eq!(error.error, "slow_down");

        let error = TokenError::from(&AuthError::storage("disk full at /var/lib"));
        assert_eq!(error.error, "server_error");
        assert!(!error.error_description.unwrap().contains("/var/lib"));
    }
}
