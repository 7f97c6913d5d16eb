use async_trait::async_trait;

use super::{
    GrantValidator, ValidatorContext, authenticate_client, ensure_grant_allowed,
    ensure_same_client,
};
use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::PkceVerifier;
use crate::types::{AuthorizationCode, GrantInput, GrantRequest, TicketKind};

/// Redeems an authorization code presented with a client secret.
pub struct AuthorizationCodeValidator;

/// Redeems an authorization code presented with a PKCE verifier.
///
/// The client secret is optional here; the verifier proves possession.
pub struct PkceAuthorizationCodeValidator;

fn code_of(request: &GrantRequest) -> Option<&str> {
    match &request.input {
        GrantInput::AuthorizationCode { code, .. } => Some(code),
        _ => None,
    }
}

/// Consumes the code and checks it belongs to this client and service.
///
/// The code is gone after this call whether or not the checks pass.
async fn redeem(request: &GrantRequest, context: &ValidatorContext) -> AuthResult<AuthorizationCode> {
    let code = code_of(request).ok_or_else(|| AuthError::invalid_request("code is required"))?;
    let ticket = context
        .tickets
        .consume(code, TicketKind::AuthorizationCode)
        .await?
        .and_then(|t| t.into_authorization_code())
        .ok_or_else(|| AuthError::invalid_grant("authorization code is invalid or expired"))?;

    ensure_same_client(request, &ticket.client_id)?;
    if ticket.service != request.service {
        return Err(AuthError::invalid_grant(format!(
            "redirect_uri '{}' does not match the authorization request",
            request.service
        )));
    }
    Ok(ticket)
}

fn complete(request: &mut GrantRequest, code: AuthorizationCode) {
    request.authentication = Some(code.authentication);
    request.scopes = code.scopes;
    request.ticket_granting_ticket = code.ticket_granting_ticket;
    request.service = code.service;
}

#[async_trait]
impl GrantValidator for AuthorizationCodeValidator {
    fn name(&self) -> &'static str {
        "authorization_code"
    }

    fn supports(&self, request: &GrantRequest) -> bool {
        code_of(request).is_some() && request.code_verifier.is_none()
    }

    async fn validate(
        &self,
        request: &mut GrantRequest,
        context: &ValidatorContext,
    ) -> AuthResult<()> {
        ensure_grant_allowed(request)?;
        authenticate_client(request, context, true).await?;

        let code = redeem(request, context).await?;
        if code.code_challenge.is_some() {
            return Err(AuthError::invalid_grant("code_verifier is required"));
        }
        complete(request, code);
        Ok(())
    }
}

#[async_trait]
impl GrantValidator for PkceAuthorizationCodeValidator {
    fn name(&self) -> &'static str {
        "pkce_authorization_code"
    }

    fn supports(&self, request: &GrantRequest) -> bool {
        code_of(request).is_some() && request.code_verifier.is_some()
    }

    async fn validate(
        &self,
        request: &mut GrantRequest,
        context: &ValidatorContext,
    ) -> AuthResult<()> {
        ensure_grant_allowed(request)?;
        authenticate_client(request, context, false).await?;

        let code = redeem(request, context).await?;
        let challenge = code.code_challenge.as_ref().ok_or_else(|| {
            AuthError::invalid_grant("authorization code was not issued with a code challenge")
        })?;
        let verifier = PkceVerifier::new(request.code_verifier.clone().unwrap_or_default())?;
        challenge.verify(&verifier)?;

        complete(request, code);
        Ok(())
    }
}
