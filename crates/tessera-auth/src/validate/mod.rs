//! Grant validators.
//!
//! A validator checks a [`GrantRequest`] against the client's policy and the
//! ticket it references, then completes the request with the
//! authentication, scopes and session the token generator needs. Redeeming
//! single-use tickets (authorization codes) happens here, through
//! [`TicketStore::consume`].
//!
//! All validators apply their checks in the same order: grant or response
//! type allowed, client authentication, then grant-specific checks.

mod authorization_code;
mod authorization_response;
mod client_credentials;
mod device_code;
mod password;
mod refresh_token;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

pub use authorization_code::{AuthorizationCodeValidator, PkceAuthorizationCodeValidator};
pub use authorization_response::AuthorizationResponseValidator;
pub use client_credentials::ClientCredentialsValidator;
pub use device_code::DeviceCodeValidator;
pub use password::PasswordValidator;
pub use refresh_token::RefreshTokenValidator;

use crate::AuthResult;
use crate::error::AuthError;
use crate::expiration::ExpirationPolicySet;
use crate::storage::{ClientRegistry, TicketStore, UserAuthenticator};
use crate::types::GrantRequest;

// =============================================================================
// Validator Trait
// =============================================================================

/// Checks and completes one kind of grant request.
#[async_trait]
pub trait GrantValidator: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Returns `true` if this validator handles `request`.
    fn supports(&self, request: &GrantRequest) -> bool;

    /// Validates `request`, filling in what the generator needs.
    ///
    /// # Errors
    ///
    /// The OAuth error describing the first failed check.
    async fn validate(&self, request: &mut GrantRequest, context: &ValidatorContext)
    -> AuthResult<()>;
}

// =============================================================================
// Validator Context
// =============================================================================

/// Collaborators shared by all validators.
#[derive(Clone)]
pub struct ValidatorContext {
    pub clients: Arc<dyn ClientRegistry>,
    pub tickets: Arc<dyn TicketStore>,
    pub users: Arc<dyn UserAuthenticator>,
    pub policies: Arc<ExpirationPolicySet>,
}

impl ValidatorContext {
    #[must_use]
    pub fn new(
        clients: Arc<dyn ClientRegistry>,
        tickets: Arc<dyn TicketStore>,
        users: Arc<dyn UserAuthenticator>,
        policies: Arc<ExpirationPolicySet>,
    ) -> Self {
        Self {
            clients,
            tickets,
            users,
            policies,
        }
    }
}

// =============================================================================
// Shared Checks
// =============================================================================

/// The client may use the request's grant type.
pub(crate) fn ensure_grant_allowed(request: &GrantRequest) -> AuthResult<()> {
    let grant_type = request
        .grant_type
        .ok_or_else(|| AuthError::invalid_request("grant_type is required"))?;
    if request.registered_client.is_grant_type_allowed(grant_type) {
        Ok(())
    } else {
        Err(AuthError::unauthorized_client(format!(
            "client '{}' may not use grant type {grant_type}",
            request.client_id
        )))
    }
}

/// The client may use the request's response type.
pub(crate) fn ensure_response_type_allowed(request: &GrantRequest) -> AuthResult<()> {
    let response_type = request
        .response_type
        .ok_or_else(|| AuthError::invalid_request("response_type is required"))?;
    if request
        .registered_client
        .is_response_type_allowed(response_type)
    {
        Ok(())
    } else {
        Err(AuthError::unauthorized_client(format!(
            "client '{}' may not use response type {response_type}",
            request.client_id
        )))
    }
}

/// Authenticates the client.
///
/// A presented secret must always verify. With `secret_required`, a
/// confidential client must present one; public clients never need to.
pub(crate) async fn authenticate_client(
    request: &GrantRequest,
    context: &ValidatorContext,
    secret_required: bool,
) -> AuthResult<()> {
    match request.client_secret.as_deref() {
        Some(secret) => {
            if context
                .clients
                .verify_secret(&request.client_id, secret)
                .await?
            {
                Ok(())
            } else {
                Err(AuthError::invalid_client("client authentication failed"))
            }
        }
        None if secret_required && request.registered_client.is_confidential() => Err(
            AuthError::invalid_client(format!("client '{}' must authenticate", request.client_id)),
        ),
        None => Ok(()),
    }
}

/// Every requested scope is permitted for the client.
pub(crate) fn ensure_scopes_allowed(request: &GrantRequest) -> AuthResult<()> {
    match request
        .scopes
        .iter()
        .find(|scope| !request.registered_client.is_scope_allowed(scope))
    {
        Some(scope) => Err(AuthError::invalid_scope(format!(
            "scope '{scope}' is not allowed for client '{}'",
            request.client_id
        ))),
        None => Ok(()),
    }
}

/// The redeemed ticket was issued to the requesting client.
pub(crate) fn ensure_same_client(request: &GrantRequest, owner: &str) -> AuthResult<()> {
    if owner == request.client_id {
        Ok(())
    } else {
        Err(AuthError::invalid_grant(format!(
            "grant was issued to another client than '{}'",
            request.client_id
        )))
    }
}

// =============================================================================
// Validator Chain
// =============================================================================

/// Ordered list of validators.
pub struct ValidatorChain {
    validators: Vec<Box<dyn GrantValidator>>,
}

impl ValidatorChain {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// The standard validators, mirroring the extractor order.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::empty()
            .register(PkceAuthorizationCodeValidator)
            .register(AuthorizationCodeValidator)
            .register(RefreshTokenValidator)
            .register(DeviceCodeValidator)
            .register(PasswordValidator)
            .register(ClientCredentialsValidator)
            .register(AuthorizationResponseValidator)
    }

    #[must_use]
    pub fn register(mut self, validator: impl GrantValidator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Validates with the first supporting validator.
    ///
    /// # Errors
    ///
    /// `invalid_request` if no validator supports the request, otherwise the
    /// selected validator's error.
    pub async fn validate(
        &self,
        request: &mut GrantRequest,
        context: &ValidatorContext,
    ) -> AuthResult<()> {
        let Some(validator) = self.validators.iter().find(|v| v.supports(request)) else {
            return Err(AuthError::invalid_request(format!(
                "no validator for {} request",
                request.flow()
            )));
        };
        debug!(validator = validator.name(), client_id = %request.client_id, "Validating grant");
        validator.validate(request, context).await
    }
}

impl Default for ValidatorChain {
    fn default() -> Self {
        Self::with_defaults()
    }
}
