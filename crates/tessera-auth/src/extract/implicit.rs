use async_trait::async_trait;

use super::{ExtractorContext, GrantExtractor, response_type_of};
use crate::AuthResult;
use crate::oauth::TokenRequest;
use crate::types::{GrantInput, GrantRequest, GrantType, ResponseType};

/// `response_type=token` and `response_type=id_token token`.
///
/// Runs after the authorize endpoint has authenticated the user, so the
/// request must already carry an authentication.
pub struct ImplicitExtractor;

#[async_trait]
impl GrantExtractor for ImplicitExtractor {
    fn name(&self) -> &'static str {
        "implicit"
    }

    fn grant_type(&self) -> Option<GrantType> {
        None
    }

    fn response_type(&self) -> Option<ResponseType> {
        Some(ResponseType::Token)
    }

    fn supports(&self, request: &TokenRequest) -> bool {
        response_type_of(request).is_some_and(|r| r.is_implicit())
    }

    async fn extract(
        &self,
        request: &TokenRequest,
        context: &ExtractorContext,
    ) -> AuthResult<GrantRequest> {
        let mut grant = context
            .grant_request(request, GrantInput::Implicit, None)
            .await?;
        grant.response_type = response_type_of(request);
        grant.generate_refresh_token = false;
        Ok(grant)
    }
}
