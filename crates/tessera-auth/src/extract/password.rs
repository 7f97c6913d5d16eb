use async_trait::async_trait;

use super::{ExtractorContext, GrantExtractor, has_grant_type, required};
use crate::AuthResult;
use crate::oauth::TokenRequest;
use crate::types::{GrantInput, GrantRequest, GrantType, ResponseType};

/// `grant_type=password`.
pub struct PasswordExtractor;

#[async_trait]
impl GrantExtractor for PasswordExtractor {
    fn name(&self) -> &'static str {
        "password"
    }

    fn grant_type(&self) -> Option<GrantType> {
        Some(GrantType::Password)
    }

    fn response_type(&self) -> Option<ResponseType> {
        None
    }

    fn supports(&self, request: &TokenRequest) -> bool {
        has_grant_type(request, GrantType::Password)
    }

    async fn extract(
        &self,
        request: &TokenRequest,
        context: &ExtractorContext,
    ) -> AuthResult<GrantRequest> {
        let username = required(request.username.as_ref(), "username")?;
        let password = required(request.password.as_ref(), "password")?;
        let input = GrantInput::Password {
            username: username.to_string(),
            password: password.to_string(),
        };
        let mut grant = context.grant_request(request, input, None).await?;
        grant.grant_type = Some(GrantType::Password);
        grant.generate_refresh_token = grant.registered_client.generate_refresh_token;
        Ok(grant)
    }
}
