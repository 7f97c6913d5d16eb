//! Registered client domain types.
//!
//! A [`RegisteredClient`] is read-only for the duration of a request. It is
//! owned by the client registry and only consulted by the engine.

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

// =============================================================================
// Grant Type
// =============================================================================

/// The wire value of the device code grant type.
pub const DEVICE_CODE_GRANT_URN: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// OAuth 2.0 grant types accepted at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow, with or without PKCE.
    AuthorizationCode,
    /// Refresh Token flow.
    RefreshToken,
    /// Resource Owner Password Credentials flow.
    /// Legacy grant, only for trusted first-party clients.
    Password,
    /// Client Credentials flow.
    ClientCredentials,
    /// Device Authorization Grant (RFC 8628) polling.
    #[serde(alias = "urn:ietf:params:oauth:grant-type:device_code")]
    DeviceCode,
}

impl GrantType {
    /// Parses a `grant_type` parameter value.
    ///
    /// The device grant is accepted both as its URN and as `device_code`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "refresh_token" => Some(Self::RefreshToken),
            "password" => Some(Self::Password),
            "client_credentials" => Some(Self::ClientCredentials),
            "device_code" | DEVICE_CODE_GRANT_URN => Some(Self::DeviceCode),
            _ => None,
        }
    }

    /// Returns the OAuth 2.0 `grant_type` parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::Password => "password",
            Self::ClientCredentials => "client_credentials",
            Self::DeviceCode => DEVICE_CODE_GRANT_URN,
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Response Type
// =============================================================================

/// OAuth 2.0 / OIDC response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Authorization code response.
    Code,
    /// Implicit access token response.
    Token,
    /// OIDC implicit ID token response.
    IdToken,
    /// OIDC implicit ID token plus access token response.
    #[serde(rename = "id_token token")]
    IdTokenToken,
    /// Device authorization response (RFC 8628).
    DeviceCode,
}

impl ResponseType {
    /// Parses a `response_type` parameter value.
    ///
    /// Multi-valued response types are order-insensitive.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let parts: BTreeSet<&str> = value.split_whitespace().collect();
        let parts: Vec<&str> = parts.into_iter().collect();
        match parts.as_slice() {
            ["code"] => Some(Self::Code),
            ["token"] => Some(Self::Token),
            ["id_token"] => Some(Self::IdToken),
            ["id_token", "token"] => Some(Self::IdTokenToken),
            ["device_code"] => Some(Self::DeviceCode),
            _ => None,
        }
    }

    /// Returns the OAuth 2.0 `response_type` parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Token => "token",
            Self::IdToken => "id_token",
            Self::IdTokenToken => "id_token token",
            Self::DeviceCode => "device_code",
        }
    }

    /// Returns `true` for response types answered directly with an access token.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        matches!(self, Self::Token | Self::IdToken | Self::IdTokenToken)
    }
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Registered Client
// =============================================================================

fn default_true() -> bool {
    true
}

/// A registered OAuth 2.0 client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredClient {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Argon2 PHC hash of the client secret. `None` for public clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Human-readable display name.
    #[serde(default)]
    pub name: String,

    /// Regular expression the resolved service must fully match.
    pub service_id_pattern: String,

    /// Grant types this client may use. Empty means all.
    #[serde(default)]
    pub allowed_grant_types: BTreeSet<GrantType>,

    /// Response types this client may use. Empty means all.
    #[serde(default)]
    pub allowed_response_types: BTreeSet<ResponseType>,

    /// Scopes this client may request. Empty means all.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Encode access tokens as signed JWTs instead of opaque ids.
    #[serde(default)]
    pub jwt_access_token: bool,

    /// Issue refresh tokens alongside access tokens.
    #[serde(default = "default_true")]
    pub generate_refresh_token: bool,

    /// Replace the refresh token on every refresh_token grant.
    #[serde(default)]
    pub renew_refresh_token: bool,
}

impl RegisteredClient {
    /// Creates a public client with default policy.
    #[must_use]
    pub fn new(client_id: impl Into<String>, service_id_pattern: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            name: client_id.clone(),
            client_id,
            client_secret: None,
            service_id_pattern: service_id_pattern.into(),
            allowed_grant_types: BTreeSet::new(),
            allowed_response_types: BTreeSet::new(),
            scopes: Vec::new(),
            jwt_access_token: false,
            generate_refresh_token: true,
            renew_refresh_token: false,
        }
    }

    /// Validates the client registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client id is empty or the service pattern is
    /// not a valid regular expression.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }
        if self.service_pattern().is_none() {
            return Err(ClientValidationError::InvalidServicePattern(
                self.service_id_pattern.clone(),
            ));
        }
        if self.allowed_grant_types.contains(&GrantType::ClientCredentials)
            && !self.is_confidential()
        {
            return Err(ClientValidationError::PublicClientCredentials);
        }
        Ok(())
    }

    /// Returns `true` if the client holds a secret.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }

    /// Checks if the grant type is allowed. An empty set allows every grant.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.allowed_grant_types.is_empty() || self.allowed_grant_types.contains(&grant_type)
    }

    /// Checks if the response type is allowed. An empty set allows every type.
    #[must_use]
    pub fn is_response_type_allowed(&self, response_type: ResponseType) -> bool {
        self.allowed_response_types.is_empty()
            || self.allowed_response_types.contains(&response_type)
    }

    /// Checks if the scope is allowed. An empty list allows every scope.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.scopes.is_empty() || self.scopes.iter().any(|s| s == scope)
    }

    /// Checks if a service id matches this client's pattern.
    #[must_use]
    pub fn matches_service(&self, service: &str) -> bool {
        self.service_pattern()
            .is_some_and(|pattern| pattern.is_match(service))
    }

    /// Returns the pattern itself when it contains no regex metacharacters.
    ///
    /// Such a pattern names exactly one service, which is used when the request
    /// does not name one.
    #[must_use]
    pub fn literal_service(&self) -> Option<&str> {
        let pattern = self.service_id_pattern.as_str();
        (!pattern.is_empty() && regex::escape(pattern) == pattern).then_some(pattern)
    }

    fn service_pattern(&self) -> Option<Regex> {
        Regex::new(&format!("^(?:{})$", self.service_id_pattern)).ok()
    }
}

/// Client registration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID is empty.
    #[error("client_id cannot be empty")]
    EmptyClientId,

    /// The service id pattern does not compile.
    #[error("invalid service id pattern: {0}")]
    InvalidServicePattern(String),

    /// Public clients cannot use the client_credentials grant.
    #[error("public clients cannot use client_credentials grant")]
    PublicClientCredentials,
}
