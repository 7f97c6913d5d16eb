use async_trait::async_trait;

use super::{ExtractorContext, GrantExtractor, has_grant_type};
use crate::AuthResult;
use crate::oauth::TokenRequest;
use crate::types::{GrantInput, GrantRequest, GrantType, ResponseType};

/// `grant_type=client_credentials`.
///
/// The client acts on its own behalf, so no refresh token is issued.
pub struct ClientCredentialsExtractor;

#[async_trait]
impl GrantExtractor for ClientCredentialsExtractor {
    fn name(&self) -> &'static str {
        "client_credentials"
    }

    fn grant_type(&self) -> Option<GrantType> {
        Some(GrantType::ClientCredentials)
    }

    fn response_type(&self) -> Option<ResponseType> {
        None
    }

    fn supports(&self, request: &TokenRequest) -> bool {
        has_grant_type(request, GrantType::ClientCredentials)
    }

    async fn extract(
        &self,
        request: &TokenRequest,
        context: &ExtractorContext,
    ) -> AuthResult<GrantRequest> {
        let mut grant = context
            .grant_request(request, GrantInput::ClientCredentials, None)
            .await?;
        grant.grant_type = Some(GrantType::ClientCredentials);
        grant.generate_refresh_token = false;
        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::context;

    #[tokio::test]
    async fn test_client_credentials_never_asks_for_refresh_token() {
        let (context, _) = context();
        let mut request = TokenRequest::grant("client_credentials");
        request.client_id = Some("cli".into());
        request.client_secret = Some(String::new());
        request.scope = Some("read write".into());

        let grant = ClientCredentialsExtractor
            .extract(&request, &context)
            .await
            .unwrap();
        assert!(!grant.generate_refresh_token);
        assert_eq!(grant.client_secret, None);
        assert_eq!(grant.scope_string(), "read write");
    }
}
