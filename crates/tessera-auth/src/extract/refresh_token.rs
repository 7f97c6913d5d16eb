use async_trait::async_trait;

use super::{ExtractorContext, GrantExtractor, has_grant_type, required};
use crate::AuthResult;
use crate::oauth::TokenRequest;
use crate::types::{GrantInput, GrantRequest, GrantType, ResponseType, TicketKind};

/// `grant_type=refresh_token`.
///
/// Never asks for a fresh refresh token; rotation is decided by the
/// generator from the client's renew policy.
pub struct RefreshTokenExtractor;

#[async_trait]
impl GrantExtractor for RefreshTokenExtractor {
    fn name(&self) -> &'static str {
        "refresh_token"
    }

    fn grant_type(&self) -> Option<GrantType> {
        Some(GrantType::RefreshToken)
    }

    fn response_type(&self) -> Option<ResponseType> {
        None
    }

    fn supports(&self, request: &TokenRequest) -> bool {
        has_grant_type(request, GrantType::RefreshToken)
    }

    async fn extract(
        &self,
        request: &TokenRequest,
        context: &ExtractorContext,
    ) -> AuthResult<GrantRequest> {
        let token = required(request.refresh_token.as_ref(), "refresh_token")?;
        let input = GrantInput::RefreshToken {
            refresh_token: token.to_string(),
        };
        let mut grant = context
            .grant_request(request, input, Some((token, TicketKind::RefreshToken)))
            .await?;
        grant.grant_type = Some(GrantType::RefreshToken);
        grant.generate_refresh_token = false;
        Ok(grant)
    }
}
