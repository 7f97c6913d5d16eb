use async_trait::async_trait;

use super::{
    GrantValidator, ValidatorContext, authenticate_client, ensure_grant_allowed,
    ensure_scopes_allowed,
};
use crate::AuthResult;
use crate::error::AuthError;
use crate::types::{Authentication, GrantInput, GrantRequest};

/// Client credentials. Only confidential clients qualify.
pub struct ClientCredentialsValidator;

#[async_trait]
impl GrantValidator for ClientCredentialsValidator {
    fn name(&self) -> &'static str {
        "client_credentials"
    }

    fn supports(&self, request: &GrantRequest) -> bool {
        matches!(request.input, GrantInput::ClientCredentials)
    }

    async fn validate(
        &self,
        request: &mut GrantRequest,
        context: &ValidatorContext,
    ) -> AuthResult<()> {
        ensure_grant_allowed(request)?;
        if !request.registered_client.is_confidential() {
            return Err(AuthError::invalid_client(
                "public clients cannot use client_credentials",
            ));
        }
        authenticate_client(request, context, true).await?;
        ensure_scopes_allowed(request)?;

        request.authentication = Some(Authentication::for_client(&request.client_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GrantType;
    use crate::validate::tests::{APP_SECRET, context, grant};

    #[tokio::test]
    async fn test_client_acts_as_its_own_principal() {
        let (context, _) = context();
        let mut request = grant(
            &context,
            "app",
            "https://app.example.com/api",
            Some(GrantType::ClientCredentials),
            GrantInput::ClientCredentials,
        )
        .await;
        request.client_secret = Some(APP_SECRET.into());
        ClientCredentialsValidator
            .validate(&mut request, &context)
            .await
            .unwrap();
        assert_eq!(
            request.authentication.map(|a| a.principal.id),
            Some("app".to_string())
        );
    }

    #[tokio::test]
    async fn test_public_client_is_rejected() {
        let (context, _) = context();
        let mut request = grant(
            &context,
            "cli",
            "urn:cli",
            Some(GrantType::ClientCredentials),
            GrantInput::ClientCredentials,
        )
        .await;
        let err = ClientCredentialsValidator
            .validate(&mut request, &context)
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client");
    }
}
