use async_trait::async_trait;

use super::{
    GrantValidator, ValidatorContext, authenticate_client, ensure_grant_allowed,
    ensure_same_client,
};
use crate::AuthResult;
use crate::error::AuthError;
use crate::types::{GrantInput, GrantRequest, TicketKind};

/// Checks a refresh token presented at the token endpoint.
///
/// The token is only read here. Whether it is replaced is decided by the
/// generator from the client's renew policy.
pub struct RefreshTokenValidator;

#[async_trait]
impl GrantValidator for RefreshTokenValidator {
    fn name(&self) -> &'static str {
        "refresh_token"
    }

    fn supports(&self, request: &GrantRequest) -> bool {
        matches!(request.input, GrantInput::RefreshToken { .. })
    }

    async fn validate(
        &self,
        request: &mut GrantRequest,
        context: &ValidatorContext,
    ) -> AuthResult<()> {
        ensure_grant_allowed(request)?;
        authenticate_client(request, context, true).await?;

        let GrantInput::RefreshToken { refresh_token } = &request.input else {
            return Err(AuthError::invalid_request("refresh_token is required"));
        };
        let token = context
            .tickets
            .get(refresh_token, TicketKind::RefreshToken)
            .await?
            .and_then(|t| t.into_refresh_token())
            .ok_or_else(|| AuthError::invalid_grant("refresh token is invalid or expired"))?;
        ensure_same_client(request, &token.client_id)?;

        if request.scopes.is_empty() {
            request.scopes = token.scopes;
        } else if let Some(scope) = request.scopes.iter().find(|s| !token.scopes.contains(*s)) {
            return Err(AuthError::invalid_scope(format!(
                "scope '{scope}' exceeds the original grant"
            )));
        }
        request.authentication = Some(token.authentication);
        request.ticket_granting_ticket = token.ticket_granting_ticket;
        request.service = token.service;
        Ok(())
    }
}
