use async_trait::async_trait;

use super::{ExtractorContext, GrantExtractor, has_grant_type, required, response_type_of};
use crate::AuthResult;
use crate::oauth::TokenRequest;
use crate::types::{GrantInput, GrantRequest, GrantType, ResponseType, TicketKind};

/// Both halves of the device flow.
///
/// `response_type=device_code` starts a device authorization; the device
/// code grant type polls for its outcome.
pub struct DeviceCodeExtractor;

#[async_trait]
impl GrantExtractor for DeviceCodeExtractor {
    fn name(&self) -> &'static str {
        "device_code"
    }

    fn grant_type(&self) -> Option<GrantType> {
        None
    }

    fn response_type(&self) -> Option<ResponseType> {
        Some(ResponseType::DeviceCode)
    }

    fn supports(&self, request: &TokenRequest) -> bool {
        has_grant_type(request, GrantType::DeviceCode)
            || response_type_of(request) == Some(ResponseType::DeviceCode)
    }

    async fn extract(
        &self,
        request: &TokenRequest,
        context: &ExtractorContext,
    ) -> AuthResult<GrantRequest> {
        let mut grant = if has_grant_type(request, GrantType::DeviceCode) {
            let device_code = required(request.device_code.as_ref(), "device_code")?;
            let input = GrantInput::DeviceCode {
                device_code: device_code.to_string(),
            };
            let mut grant = context
                .grant_request(request, input, Some((device_code, TicketKind::DeviceToken)))
                .await?;
            grant.grant_type = Some(GrantType::DeviceCode);
            grant
        } else {
            let mut grant = context
                .grant_request(request, GrantInput::DeviceAuthorization, None)
                .await?;
            grant.response_type = Some(ResponseType::DeviceCode);
            grant
        };
        grant.generate_refresh_token = grant.registered_client.generate_refresh_token;
        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractorRegistry;
    use crate::extract::tests::context;
    use crate::storage::TicketStore;
    use crate::types::{DEVICE_CODE_GRANT_URN, DeviceToken, Service, Ticket};

    #[tokio::test]
    async fn test_device_authorization_request() {
        let (context, _) = context();
        let mut request = TokenRequest::response("device_code");
        request.client_id = Some("cli".into());
        request.scope = Some("openid".into());

        let grant = ExtractorRegistry::with_defaults()
            .extract(&request, &context)
            .await
            .unwrap();
        assert_eq!(grant.grant_type, None);
        assert_eq!(grant.response_type, Some(ResponseType::DeviceCode));
        assert_eq!(grant.input, GrantInput::DeviceAuthorization);
        assert!(grant.scopes.contains("openid"));
    }

    #[tokio::test]
    async fn test_device_poll_keeps_grant_type() {
        let (context, tickets) = context();
        let now = time::OffsetDateTime::now_utc();
        tickets
            .create(Ticket::from(DeviceToken {
                id: "ODT-1".into(),
                user_code: "ABCD2345".into(),
                client_id: "cli".into(),
                service: Service::new("urn:cli"),
                scopes: Default::default(),
                approved: false,
                authentication: None,
                last_polled_at: None,
                created_at: now,
                expires_at: now + time::Duration::minutes(5),
            }))
            .await
            .unwrap();
        let mut request = TokenRequest::grant(DEVICE_CODE_GRANT_URN);
        request.client_id = Some("cli".into());
        request.device_code = Some("ODT-1".into());

        let grant = ExtractorRegistry::with_defaults()
            .extract(&request, &context)
            .await
            .unwrap();
        assert_eq!(grant.grant_type, Some(GrantType::DeviceCode));
        assert_eq!(grant.service.id, "urn:cli");
    }

    #[tokio::test]
    async fn test_device_poll_requires_device_code() {
        let (context, _) = context();
        let mut request = TokenRequest::grant(DEVICE_CODE_GRANT_URN);
        request.client_id = Some("cli".into());
        let err = DeviceCodeExtractor
            .extract(&request, &context)
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
    }
}
