use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::debug;

use super::{
    GrantValidator, ValidatorContext, authenticate_client, ensure_grant_allowed,
    ensure_response_type_allowed, ensure_scopes_allowed,
};
use crate::AuthResult;
use crate::error::AuthError;
use crate::types::{GrantInput, GrantRequest, Ticket, TicketKind};

/// Both halves of the device flow.
///
/// A device authorization only needs the client to be allowed the
/// `device_code` response type. A poll reports `slow_down` when it comes
/// sooner than the refresh interval after the previous one, and
/// `authorization_pending` until the user approves.
pub struct DeviceCodeValidator;

impl DeviceCodeValidator {
    async fn validate_authorization(
        request: &GrantRequest,
        context: &ValidatorContext,
    ) -> AuthResult<()> {
        ensure_response_type_allowed(request)?;
        authenticate_client(request, context, false).await?;
        ensure_scopes_allowed(request)
    }

    async fn validate_poll(
        request: &mut GrantRequest,
        context: &ValidatorContext,
        device_code: String,
    ) -> AuthResult<()> {
        ensure_grant_allowed(request)?;
        authenticate_client(request, context, false).await?;

        let now = OffsetDateTime::now_utc();
        let interval = context.policies.device_refresh_interval();
        let client_id = request.client_id.clone();
        // Writes last_polled_at only; approval fields stay as stored.
        let record_poll = |ticket: &mut Ticket| -> AuthResult<()> {
            let Some(token) = ticket.as_device_token_mut() else {
                return Err(AuthError::invalid_grant("device code is invalid or expired"));
            };
            if token.client_id != client_id {
                return Err(AuthError::invalid_grant(
                    "device code was issued to another client",
                ));
            }
            if token
                .last_polled_at
                .is_some_and(|last| (now - last).unsigned_abs() < interval)
            {
                return Err(AuthError::SlowDown);
            }
            token.last_polled_at = Some(now);
            Ok(())
        };

        let token = match context
            .tickets
            .modify(&device_code, TicketKind::DeviceToken, &record_poll)
            .await
        {
            Ok(ticket) => ticket
                .and_then(Ticket::into_device_token)
                .ok_or_else(|| AuthError::invalid_grant("device code is invalid or expired"))?,
            Err(AuthError::SlowDown) => {
                debug!(client_id = %request.client_id, "Device polled too fast");
                return Err(AuthError::SlowDown);
            }
            Err(e) => return Err(e),
        };
        if !token.approved {
            return Err(AuthError::AuthorizationPending);
        }

        request.authentication = Some(token.authentication.ok_or_else(|| {
            AuthError::internal("approved device code carries no authentication")
        })?);
        request.scopes = token.scopes;
        request.service = token.service;
        Ok(())
    }
}

#[async_trait]
impl GrantValidator for DeviceCodeValidator {
    fn name(&self) -> &'static str {
        "device_code"
    }

    fn supports(&self, request: &GrantRequest) -> bool {
        matches!(
            request.input,
            GrantInput::DeviceCode { .. } | GrantInput::DeviceAuthorization
        )
    }

    async fn validate(
        &self,
        request: &mut GrantRequest,
        context: &ValidatorContext,
    ) -> AuthResult<()> {
        match &request.input {
            GrantInput::DeviceCode { device_code } => {
                let device_code = device_code.clone();
                Self::validate_poll(request, context, device_code).await
            }
            _ => Self::validate_authorization(request, context).await,
        }
    }
}
