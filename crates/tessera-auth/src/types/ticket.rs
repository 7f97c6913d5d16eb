//! Tickets: every time-bounded credential the engine hands out.
//!
//! All tickets carry a hard `expires_at` computed by the expiration policy
//! at creation time. A ticket past that instant is treated as absent by the
//! store, whether or not it has been swept yet.

use std::collections::{BTreeMap, BTreeSet};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::oauth::PkceChallenge;

// =============================================================================
// Ticket Kind and Identifiers
// =============================================================================

/// Alphabet for human-typed device user codes (no vowels, no look-alikes).
pub const USER_CODE_ALPHABET: &[u8] = b"BCDFGHJKLMNPQRSTVWXZ";

/// The kinds of tickets kept in the ticket store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    /// Single-use authorization code (`OC-`).
    AuthorizationCode,
    /// Access token (`AT-`).
    AccessToken,
    /// Refresh token (`RT-`).
    RefreshToken,
    /// Device code held by the polling device (`ODT-`).
    DeviceToken,
    /// User code typed on the approval page, keyed by the code itself.
    DeviceUserCode,
}

impl TicketKind {
    /// Id prefix for generated ticket ids.
    ///
    /// User codes are short and unprefixed.
    #[must_use]
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Self::AuthorizationCode => Some("OC"),
            Self::AccessToken => Some("AT"),
            Self::RefreshToken => Some("RT"),
            Self::DeviceToken => Some("ODT"),
            Self::DeviceUserCode => None,
        }
    }

    /// Returns the kind as a string for logging.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::DeviceToken => "device_token",
            Self::DeviceUserCode => "device_user_code",
        }
    }
}

impl std::fmt::Display for TicketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generates a collision-resistant ticket id: `PREFIX-` plus 256 random bits.
#[must_use]
pub fn generate_ticket_id(kind: TicketKind) -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    let body = URL_SAFE_NO_PAD.encode(bytes);
    match kind.prefix() {
        Some(prefix) => format!("{prefix}-{body}"),
        None => body,
    }
}

/// Generates a device user code of `length` characters.
#[must_use]
pub fn generate_user_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| USER_CODE_ALPHABET[rng.gen_range(0..USER_CODE_ALPHABET.len())] as char)
        .collect()
}

// =============================================================================
// Principal, Authentication, Session, Service
// =============================================================================

/// The authenticated subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Principal id, emitted as the `sub` claim.
    pub id: String,
    /// Released attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// The result of authenticating a principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    /// Who was authenticated.
    pub principal: Principal,
    /// When authentication happened.
    pub authenticated_at: OffsetDateTime,
}

impl Authentication {
    /// Creates an authentication for `principal_id` happening now.
    #[must_use]
    pub fn new(
        principal_id: impl Into<String>,
        attributes: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            principal: Principal {
                id: principal_id.into(),
                attributes,
            },
            authenticated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Creates the authentication representing a client acting on its own behalf.
    #[must_use]
    pub fn for_client(client_id: &str) -> Self {
        Self::new(client_id, BTreeMap::new())
    }
}

/// The SSO session (ticket-granting ticket) that backs a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoSession {
    /// Session id.
    pub id: String,
    /// When the session ends.
    pub expires_at: OffsetDateTime,
}

impl SsoSession {
    /// Remaining session lifetime at `now`, zero once the session has ended.
    #[must_use]
    pub fn remaining(&self, now: OffsetDateTime) -> std::time::Duration {
        (self.expires_at - now)
            .try_into()
            .unwrap_or(std::time::Duration::ZERO)
    }
}

/// The relying party a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Service {
    /// Service id, usually the redirect URI.
    pub id: String,
}

impl Service {
    /// Creates a service from its id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

// =============================================================================
// Concrete Tickets
// =============================================================================

/// A single-use authorization code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub id: String,
    pub client_id: String,
    /// The service (redirect URI) the code was issued for.
    pub service: Service,
    pub authentication: Authentication,
    pub scopes: BTreeSet<String>,
    /// PKCE challenge recorded on the authorization request.
    pub code_challenge: Option<PkceChallenge>,
    pub ticket_granting_ticket: Option<SsoSession>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// An access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: String,
    pub client_id: String,
    pub service: Service,
    pub authentication: Authentication,
    pub scopes: BTreeSet<String>,
    /// The refresh token this access token was minted from or alongside.
    pub refresh_token_id: Option<String>,
    pub ticket_granting_ticket: Option<SsoSession>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// A refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: String,
    pub client_id: String,
    pub service: Service,
    pub authentication: Authentication,
    pub scopes: BTreeSet<String>,
    pub ticket_granting_ticket: Option<SsoSession>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// A device code awaiting out-of-band approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceToken {
    /// The device code.
    pub id: String,
    /// The paired user code.
    pub user_code: String,
    pub client_id: String,
    pub service: Service,
    pub scopes: BTreeSet<String>,
    pub approved: bool,
    /// Set by the approval endpoint.
    pub authentication: Option<Authentication>,
    /// When the device last polled the token endpoint.
    pub last_polled_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Lookup entry from a user code to its device code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceUserCode {
    /// The user code.
    pub id: String,
    pub device_code: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

// =============================================================================
// Ticket
// =============================================================================

/// Any ticket kept in the ticket store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ticket {
    AuthorizationCode(AuthorizationCode),
    AccessToken(AccessToken),
    RefreshToken(RefreshToken),
    DeviceToken(DeviceToken),
    DeviceUserCode(DeviceUserCode),
}

impl Ticket {
    /// The ticket id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::AuthorizationCode(t) => &t.id,
            Self::AccessToken(t) => &t.id,
            Self::RefreshToken(t) => &t.id,
            Self::DeviceToken(t) => &t.id,
            Self::DeviceUserCode(t) => &t.id,
        }
    }

    /// The ticket kind.
    #[must_use]
    pub fn kind(&self) -> TicketKind {
        match self {
            Self::AuthorizationCode(_) => TicketKind::AuthorizationCode,
            Self::AccessToken(_) => TicketKind::AccessToken,
            Self::RefreshToken(_) => TicketKind::RefreshToken,
            Self::DeviceToken(_) => TicketKind::DeviceToken,
            Self::DeviceUserCode(_) => TicketKind::DeviceUserCode,
        }
    }

    /// When the ticket was created.
    #[must_use]
    pub fn created_at(&self) -> OffsetDateTime {
        match self {
            Self::AuthorizationCode(t) => t.created_at,
            Self::AccessToken(t) => t.created_at,
            Self::RefreshToken(t) => t.created_at,
            Self::DeviceToken(t) => t.created_at,
            Self::DeviceUserCode(t) => t.created_at,
        }
    }

    /// When the ticket stops being valid.
    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        match self {
            Self::AuthorizationCode(t) => t.expires_at,
            Self::AccessToken(t) => t.expires_at,
            Self::RefreshToken(t) => t.expires_at,
            Self::DeviceToken(t) => t.expires_at,
            Self::DeviceUserCode(t) => t.expires_at,
        }
    }

    /// Returns `true` if the ticket has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at()
    }

    /// Returns `true` if the ticket has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    /// The client the ticket was issued to, if it is client-bound.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::AuthorizationCode(t) => Some(&t.client_id),
            Self::AccessToken(t) => Some(&t.client_id),
            Self::RefreshToken(t) => Some(&t.client_id),
            Self::DeviceToken(t) => Some(&t.client_id),
            Self::DeviceUserCode(_) => None,
        }
    }

    /// The service the ticket was issued for.
    #[must_use]
    pub fn service(&self) -> Option<&Service> {
        match self {
            Self::AuthorizationCode(t) => Some(&t.service),
            Self::AccessToken(t) => Some(&t.service),
            Self::RefreshToken(t) => Some(&t.service),
            Self::DeviceToken(t) => Some(&t.service),
            Self::DeviceUserCode(_) => None,
        }
    }

    #[must_use]
    pub fn into_authorization_code(self) -> Option<AuthorizationCode> {
        match self {
            Self::AuthorizationCode(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_access_token(self) -> Option<AccessToken> {
        match self {
            Self::AccessToken(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_refresh_token(self) -> Option<RefreshToken> {
        match self {
            Self::RefreshToken(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_device_token(self) -> Option<DeviceToken> {
        match self {
            Self::DeviceToken(t) => Some(t),
            _ => None,
        }
    }

    /// Mutable view of a device token, for in-place store updates.
    pub fn as_device_token_mut(&mut self) -> Option<&mut DeviceToken> {
        match self {
            Self::DeviceToken(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_device_user_code(self) -> Option<DeviceUserCode> {
        match self {
            Self::DeviceUserCode(t) => Some(t),
            _ => None,
        }
    }
}

impl From<AuthorizationCode> for Ticket {
    fn from(t: AuthorizationCode) -> Self {
        Self::AuthorizationCode(t)
    }
}

impl From<AccessToken> for Ticket {
    fn from(t: AccessToken) -> Self {
        Self::AccessToken(t)
    }
}

impl From<RefreshToken> for Ticket {
    fn from(t: RefreshToken) -> Self {
        Self::RefreshToken(t)
    }
}

impl From<DeviceToken> for Ticket {
    fn from(t: DeviceToken) -> Self {
        Self::DeviceToken(t)
    }
}

impl From<DeviceUserCode> for Ticket {
    fn from(t: DeviceUserCode) -> Self {
        Self::DeviceUserCode(t)
    }
}
