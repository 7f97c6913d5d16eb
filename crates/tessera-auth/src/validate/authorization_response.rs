use async_trait::async_trait;

use super::{
    GrantValidator, ValidatorContext, authenticate_client, ensure_response_type_allowed,
    ensure_scopes_allowed,
};
use crate::AuthResult;
use crate::error::AuthError;
use crate::types::{GrantInput, GrantRequest};

/// Implicit responses (`token`, `id_token token`) from the authorize endpoint.
///
/// The user has already authenticated there; this only enforces client policy.
pub struct AuthorizationResponseValidator;

#[async_trait]
impl GrantValidator for AuthorizationResponseValidator {
    fn name(&self) -> &'static str {
        "authorization_response"
    }

    fn supports(&self, request: &GrantRequest) -> bool {
        matches!(request.input, GrantInput::Implicit)
    }

    async fn validate(
        &self,
        request: &mut GrantRequest,
        context: &ValidatorContext,
    ) -> AuthResult<()> {
        ensure_response_type_allowed(request)?;
        authenticate_client(request, context, false).await?;
        if request.authentication.is_none() {
            return Err(AuthError::invalid_request(
                "implicit responses require an authenticated user",
            ));
        }
        ensure_scopes_allowed(request)
    }
}
