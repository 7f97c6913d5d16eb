use async_trait::async_trait;

use super::{
    GrantValidator, ValidatorContext, authenticate_client, ensure_grant_allowed,
    ensure_scopes_allowed,
};
use crate::AuthResult;
use crate::error::AuthError;
use crate::types::{GrantInput, GrantRequest};

/// Resource owner password credentials.
pub struct PasswordValidator;

#[async_trait]
impl GrantValidator for PasswordValidator {
    fn name(&self) -> &'static str {
        "password"
    }

    fn supports(&self, request: &GrantRequest) -> bool {
        matches!(request.input, GrantInput::Password { .. })
    }

    async fn validate(
        &self,
        request: &mut GrantRequest,
        context: &ValidatorContext,
    ) -> AuthResult<()> {
        ensure_grant_allowed(request)?;
        authenticate_client(request, context, true).await?;
        ensure_scopes_allowed(request)?;

        let GrantInput::Password { username, password } = &request.input else {
            return Err(AuthError::invalid_request("username and password are required"));
        };
        let authentication = context
            .users
            .authenticate(username, password)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("invalid resource owner credentials"))?;
        request.authentication = Some(authentication);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GrantType;
    use crate::validate::tests::{context, grant};

    async fn password_grant(context: &ValidatorContext, password: &str) -> GrantRequest {
        grant(
            context,
            "cli",
            "urn:cli",
            Some(GrantType::Password),
            GrantInput::Password {
                username: "alice".into(),
                password: password.into(),
            },
        )
        .await
    }

    #[tokio::test]
    async fn test_valid_credentials_authenticate_user() {
        let (context, _) = context();
        let mut request = password_grant(&context, "wonderland").await;
        PasswordValidator
            .validate(&mut request, &context)
            .await
            .unwrap();
        assert_eq!(
            request.authentication.map(|a| a.principal.id),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn test_bad_password_is_invalid_grant() {
        let (context, _) = context();
        let mut request = password_grant(&context, "looking-glass").await;
        let err = PasswordValidator
            .validate(&mut request, &context)
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
        assert!(request.authentication.is_none());
    }
}
