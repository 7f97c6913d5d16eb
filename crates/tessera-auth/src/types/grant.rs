//! The canonical grant request produced by extractors.

use std::collections::BTreeSet;

use super::client::{GrantType, RegisteredClient, ResponseType};
use super::ticket::{Authentication, Service, SsoSession};

/// Grant-specific material carried from the raw request to the validator.
#[derive(Clone, PartialEq, Eq)]
pub enum GrantInput {
    /// `grant_type=authorization_code`.
    AuthorizationCode {
        code: String,
        redirect_uri: Option<String>,
    },
    /// `grant_type=refresh_token`.
    RefreshToken { refresh_token: String },
    /// `grant_type=password`.
    Password { username: String, password: String },
    /// `grant_type=client_credentials`.
    ClientCredentials,
    /// Device token polling.
    DeviceCode { device_code: String },
    /// `response_type=device_code` at the device authorization endpoint.
    DeviceAuthorization,
    /// `response_type=token` or `id_token token`.
    Implicit,
}

impl std::fmt::Debug for GrantInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorizationCode { redirect_uri, .. } => f
                .debug_struct("AuthorizationCode")
                .field("code", &"[REDACTED]")
                .field("redirect_uri", redirect_uri)
                .finish(),
            Self::RefreshToken { .. } => f
                .debug_struct("RefreshToken")
                .field("refresh_token", &"[REDACTED]")
                .finish(),
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::ClientCredentials => write!(f, "ClientCredentials"),
            Self::DeviceCode { .. } => f
                .debug_struct("DeviceCode")
                .field("device_code", &"[REDACTED]")
                .finish(),
            Self::DeviceAuthorization => write!(f, "DeviceAuthorization"),
            Self::Implicit => write!(f, "Implicit"),
        }
    }
}

/// A normalized token request.
///
/// Extractors fill in the client and service. Validators complete the
/// authentication, scopes and session from the ticket they redeem.
#[derive(Debug, Clone)]
pub struct GrantRequest {
    /// Set for token endpoint grants.
    pub grant_type: Option<GrantType>,
    /// Set for response-type requests (device authorization, implicit).
    pub response_type: Option<ResponseType>,
    pub client_id: String,
    pub registered_client: RegisteredClient,
    /// Secret presented by the client, from HTTP Basic or the body.
    pub client_secret: Option<String>,
    pub service: Service,
    /// Absent until a validator establishes it, and for pending device grants.
    pub authentication: Option<Authentication>,
    pub scopes: BTreeSet<String>,
    pub ticket_granting_ticket: Option<SsoSession>,
    pub code_verifier: Option<String>,
    /// Whether a refresh token should be minted alongside the access token.
    pub generate_refresh_token: bool,
    pub input: GrantInput,
}

impl GrantRequest {
    /// Creates a request with no authentication, scopes or session yet.
    #[must_use]
    pub fn new(registered_client: RegisteredClient, service: Service, input: GrantInput) -> Self {
        Self {
            grant_type: None,
            response_type: None,
            client_id: registered_client.client_id.clone(),
            registered_client,
            client_secret: None,
            service,
            authentication: None,
            scopes: BTreeSet::new(),
            ticket_granting_ticket: None,
            code_verifier: None,
            generate_refresh_token: false,
            input,
        }
    }

    /// Label for logs: the grant type if present, else the response type.
    #[must_use]
    pub fn flow(&self) -> &'static str {
        match (self.grant_type, self.response_type) {
            (Some(grant), _) => grant.as_str(),
            (None, Some(response)) => response.as_str(),
            (None, None) => "unknown",
        }
    }

    /// Space-separated scope string.
    #[must_use]
    pub fn scope_string(&self) -> String {
        join_scopes(&self.scopes)
    }
}

/// Parses a space-delimited `scope` parameter.
#[must_use]
pub fn parse_scopes(scope: Option<&str>) -> BTreeSet<String> {
    scope
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Joins scopes into a space-delimited string.
#[must_use]
pub fn join_scopes(scopes: &BTreeSet<String>) -> String {
    scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}
