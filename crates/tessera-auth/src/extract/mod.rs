//! Grant extractors.
//!
//! One extractor per grant or response type turns a raw [`TokenRequest`]
//! into a canonical [`GrantRequest`]. The registry tries them in
//! registration order and uses the first whose `supports` returns true.
//!
//! Extractors resolve the registered client and the target service. They
//! never consume tickets and never check credentials; that is the
//! validator's job.

mod authorization_code;
mod client_credentials;
mod device_code;
mod implicit;
mod password;
mod refresh_token;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

pub use authorization_code::{AuthorizationCodeExtractor, PkceAuthorizationCodeExtractor};
pub use client_credentials::ClientCredentialsExtractor;
pub use device_code::DeviceCodeExtractor;
pub use implicit::ImplicitExtractor;
pub use password::PasswordExtractor;
pub use refresh_token::RefreshTokenExtractor;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::TokenRequest;
use crate::storage::{ClientRegistry, TicketStore};
use crate::types::{
    GrantInput, GrantRequest, GrantType, RegisteredClient, ResponseType, Service, TicketKind,
    parse_scopes,
};

// =============================================================================
// Extractor Trait
// =============================================================================

/// Normalizes one kind of raw request.
#[async_trait]
pub trait GrantExtractor: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &'static str;

    /// The grant type this extractor produces, if any.
    fn grant_type(&self) -> Option<GrantType>;

    /// The response type this extractor produces, if any.
    fn response_type(&self) -> Option<ResponseType>;

    /// Returns `true` if this extractor handles `request`.
    fn supports(&self, request: &TokenRequest) -> bool;

    /// Builds the canonical grant request, with its grant or response type set.
    ///
    /// # Errors
    ///
    /// - `invalid_request` for missing parameters or an unresolvable service
    /// - `invalid_client` for an unknown client
    /// - `invalid_grant` when the referenced ticket is needed and absent
    async fn extract(
        &self,
        request: &TokenRequest,
        context: &ExtractorContext,
    ) -> AuthResult<GrantRequest>;
}

/// Returns `true` if the request's `grant_type` parses to `grant_type`.
pub(crate) fn has_grant_type(request: &TokenRequest, grant_type: GrantType) -> bool {
    request
        .grant_type
        .as_deref()
        .and_then(GrantType::parse)
        .is_some_and(|g| g == grant_type)
}

/// Returns the response type if the request carries no grant type.
pub(crate) fn response_type_of(request: &TokenRequest) -> Option<ResponseType> {
    if request.grant_type.is_some() {
        return None;
    }
    request.response_type.as_deref().and_then(ResponseType::parse)
}

/// Returns a required, non-empty parameter.
pub(crate) fn required<'a>(value: Option<&'a String>, name: &str) -> AuthResult<&'a str> {
    value
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::invalid_request(format!("{name} is required")))
}

// =============================================================================
// Extractor Context
// =============================================================================

/// Read-only collaborators shared by all extractors.
#[derive(Clone)]
pub struct ExtractorContext {
    clients: Arc<dyn ClientRegistry>,
    tickets: Arc<dyn TicketStore>,
}

impl ExtractorContext {
    #[must_use]
    pub fn new(clients: Arc<dyn ClientRegistry>, tickets: Arc<dyn TicketStore>) -> Self {
        Self { clients, tickets }
    }

    /// Looks up the client named by `client_id`.
    ///
    /// # Errors
    ///
    /// `invalid_request` if no client id was sent, `invalid_client` if it is unknown.
    pub async fn registered_client(&self, request: &TokenRequest) -> AuthResult<RegisteredClient> {
        let client_id = required(request.client_id.as_ref(), "client_id")?;
        self.clients
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client(format!("unknown client '{client_id}'")))
    }

    /// Builds a grant request with the client and service resolved.
    ///
    /// The service is, in order: the `service` parameter, `redirect_uri`, the
    /// service recorded on `referenced` ticket, or the client's pattern when
    /// it names exactly one service. It must match the client's pattern.
    ///
    /// # Errors
    ///
    /// See [`GrantExtractor::extract`].
    pub async fn grant_request(
        &self,
        request: &TokenRequest,
        input: GrantInput,
        referenced: Option<(&str, TicketKind)>,
    ) -> AuthResult<GrantRequest> {
        let client = self.registered_client(request).await?;

        let requested = request
            .service
            .as_deref()
            .or(request.redirect_uri.as_deref())
            .filter(|s| !s.is_empty());
        let service = match (requested, referenced) {
            (Some(service), _) => Service::new(service),
            (None, Some((id, kind))) => self.referenced_service(id, kind).await?,
            (None, None) => client
                .literal_service()
                .map(Service::new)
                .ok_or_else(|| AuthError::invalid_request("service cannot be resolved"))?,
        };
        if !client.matches_service(&service.id) {
            return Err(AuthError::invalid_request(format!(
                "service '{}' is not allowed for client '{}'",
                service.id, client.client_id
            )));
        }

        let mut grant = GrantRequest::new(client, service, input);
        grant.client_secret = request.client_secret.clone().filter(|s| !s.is_empty());
        grant.scopes = parse_scopes(request.scope.as_deref());
        grant.authentication = request.authentication.clone();
        grant.ticket_granting_ticket = request.ticket_granting_ticket.clone();
        Ok(grant)
    }

    async fn referenced_service(&self, id: &str, kind: TicketKind) -> AuthResult<Service> {
        self.tickets
            .get(id, kind)
            .await?
            .and_then(|ticket| ticket.service().cloned())
            .ok_or_else(|| AuthError::invalid_grant(format!("{kind} is invalid or expired")))
    }
}

// =============================================================================
// Extractor Registry
// =============================================================================

/// Ordered list of extractors.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn GrantExtractor>>,
}

impl ExtractorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// The standard registration order.
    ///
    /// PKCE precedes the plain authorization code extractor, so a request
    /// carrying `code_verifier` is always treated as a PKCE redemption.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::empty()
            .register(PkceAuthorizationCodeExtractor)
            .register(AuthorizationCodeExtractor)
            .register(RefreshTokenExtractor)
            .register(DeviceCodeExtractor)
            .register(PasswordExtractor)
            .register(ClientCredentialsExtractor)
            .register(ImplicitExtractor)
    }

    /// Appends an extractor.
    #[must_use]
    pub fn register(mut self, extractor: impl GrantExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Names of registered extractors in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Finds the first extractor supporting `request`.
    #[must_use]
    pub fn select(&self, request: &TokenRequest) -> Option<&dyn GrantExtractor> {
        self.extractors
            .iter()
            .find(|e| e.supports(request))
            .map(Box::as_ref)
    }

    /// Extracts a grant request with the first supporting extractor.
    ///
    /// # Errors
    ///
    /// `unsupported_response_type` for an unknown response type without a
    /// grant type, otherwise `unsupported_grant_type` when nothing matches;
    /// or whatever the selected extractor returns.
    pub async fn extract(
        &self,
        request: &TokenRequest,
        context: &ExtractorContext,
    ) -> AuthResult<GrantRequest> {
        let Some(extractor) = self.select(request) else {
            return Err(match (&request.grant_type, &request.response_type) {
                (None, Some(response_type)) => {
                    AuthError::unsupported_response_type(response_type.clone())
                }
                (grant_type, _) => AuthError::unsupported_grant_type(
                    grant_type.clone().unwrap_or_else(|| "none".to_string()),
                ),
            });
        };
        debug!(extractor = extractor.name(), "Selected grant extractor");
        extractor.extract(request, context).await
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
