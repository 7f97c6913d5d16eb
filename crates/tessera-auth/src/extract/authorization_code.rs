use async_trait::async_trait;

use super::{ExtractorContext, GrantExtractor, has_grant_type, required};
use crate::AuthResult;
use crate::oauth::TokenRequest;
use crate::types::{GrantInput, GrantRequest, GrantType, ResponseType, TicketKind};

/// `grant_type=authorization_code` without a code verifier.
pub struct AuthorizationCodeExtractor;

/// `grant_type=authorization_code` with a `code_verifier`.
///
/// The verifier is only carried forward here; the comparison against the
/// stored challenge happens in the PKCE validator.
pub struct PkceAuthorizationCodeExtractor;

async fn extract_code(
    request: &TokenRequest,
    context: &ExtractorContext,
) -> AuthResult<GrantRequest> {
    let code = required(request.code.as_ref(), "code")?;
    let input = GrantInput::AuthorizationCode {
        code: code.to_string(),
        redirect_uri: request.redirect_uri.clone(),
    };
    let mut grant = context
        .grant_request(request, input, Some((code, TicketKind::AuthorizationCode)))
        .await?;
    grant.grant_type = Some(GrantType::AuthorizationCode);
    grant.generate_refresh_token = grant.registered_client.generate_refresh_token;
    Ok(grant)
}

#[async_trait]
impl GrantExtractor for AuthorizationCodeExtractor {
    fn name(&self) -> &'static str {
        "authorization_code"
    }

    fn grant_type(&self) -> Option<GrantType> {
        Some(GrantType::AuthorizationCode)
    }

    fn response_type(&self) -> Option<ResponseType> {
        Some(ResponseType::Code)
    }

    fn supports(&self, request: &TokenRequest) -> bool {
        has_grant_type(request, GrantType::AuthorizationCode)
    }

    async fn extract(
        &self,
        request: &TokenRequest,
        context: &ExtractorContext,
    ) -> AuthResult<GrantRequest> {
        extract_code(request, context).await
    }
}

#[async_trait]
impl GrantExtractor for PkceAuthorizationCodeExtractor {
    fn name(&self) -> &'static str {
        "pkce_authorization_code"
    }

    fn grant_type(&self) -> Option<GrantType> {
        Some(GrantType::AuthorizationCode)
    }

    fn response_type(&self) -> Option<ResponseType> {
        Some(ResponseType::Code)
    }

    fn supports(&self, request: &TokenRequest) -> bool {
        has_grant_type(request, GrantType::AuthorizationCode)
            && request.code_verifier.as_deref().is_some_and(|v| !v.is_empty())
    }

    async fn extract(
        &self,
        request: &TokenRequest,
        context: &ExtractorContext,
    ) -> AuthResult<GrantRequest> {
        let mut grant = extract_code(request, context).await?;
        grant.code_verifier = request.code_verifier.clone();
        Ok(grant)
    }
}
