//! Ticket creation.
//!
//! The generator turns a validated [`GrantRequest`] into persisted tickets.
//! Every ticket it returns has already been written to the [`TicketStore`];
//! a store failure aborts the request.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::debug;

use crate::AuthResult;
use crate::error::AuthError;
use crate::expiration::ExpirationPolicySet;
use crate::oauth::PkceChallenge;
use crate::storage::TicketStore;
use crate::types::{
    AccessToken, Authentication, AuthorizationCode, DeviceToken, DeviceUserCode, GrantInput,
    GrantRequest, RefreshToken, Service, SsoSession, Ticket, TicketKind, generate_ticket_id,
    generate_user_code,
};

const USER_CODE_ATTEMPTS: usize = 5;

/// What the generator produced for a request.
#[derive(Debug, Clone)]
pub enum GeneratedTokens {
    /// An access token, with a refresh token when one was minted or rotated.
    Tokens {
        access_token: AccessToken,
        refresh_token: Option<RefreshToken>,
    },
    /// A pending device authorization.
    Device {
        device_token: DeviceToken,
        interval: Duration,
    },
}

/// Input for [`TokenGenerator::create_authorization_code`].
#[derive(Debug, Clone)]
pub struct NewAuthorizationCode {
    pub client_id: String,
    pub service: Service,
    pub authentication: Authentication,
    pub scopes: BTreeSet<String>,
    pub code_challenge: Option<PkceChallenge>,
    pub ticket_granting_ticket: Option<SsoSession>,
}

/// Creates and persists tickets.
#[derive(Clone)]
pub struct TokenGenerator {
    tickets: Arc<dyn TicketStore>,
    policies: Arc<ExpirationPolicySet>,
}

impl TokenGenerator {
    #[must_use]
    pub fn new(tickets: Arc<dyn TicketStore>, policies: Arc<ExpirationPolicySet>) -> Self {
        Self { tickets, policies }
    }

    /// Issues the tickets for a validated request.
    ///
    /// # Errors
    ///
    /// - `invalid_grant` if a refresh or device token was redeemed concurrently,
    ///   or the SSO session behind a sovereign ticket has ended
    /// - `server_error` if the store fails
    pub async fn generate(&self, request: &GrantRequest) -> AuthResult<GeneratedTokens> {
        let now = OffsetDateTime::now_utc();
        match &request.input {
            GrantInput::DeviceAuthorization => self.create_device_authorization(request, now).await,
            GrantInput::DeviceCode { device_code } => {
                self.redeem_device_token(device_code).await?;
                self.issue(request, now).await
            }
            GrantInput::RefreshToken { refresh_token } => {
                self.refresh(request, refresh_token, now).await
            }
            _ => self.issue(request, now).await,
        }
    }

    /// Creates an authorization code for the authorize flow.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the store fails.
    pub async fn create_authorization_code(
        &self,
        code: NewAuthorizationCode,
    ) -> AuthResult<AuthorizationCode> {
        let now = OffsetDateTime::now_utc();
        let expires_at = self.expires_at(
            TicketKind::AuthorizationCode,
            code.ticket_granting_ticket.as_ref(),
            now,
        )?;
        let code = AuthorizationCode {
            id: generate_ticket_id(TicketKind::AuthorizationCode),
            client_id: code.client_id,
            service: code.service,
            authentication: code.authentication,
            scopes: code.scopes,
            code_challenge: code.code_challenge,
            ticket_granting_ticket: code.ticket_granting_ticket,
            created_at: now,
            expires_at,
        };
        self.tickets.create(Ticket::from(code.clone())).await?;
        Ok(code)
    }

    /// An access token, plus a refresh token when both request and client ask for one.
    async fn issue(
        &self,
        request: &GrantRequest,
        now: OffsetDateTime,
    ) -> AuthResult<GeneratedTokens> {
        let authentication = authentication_of(request)?;
        let wants_refresh =
            request.generate_refresh_token && request.registered_client.generate_refresh_token;
        let refresh_token = if wants_refresh {
            let scopes = request.scopes.clone();
            Some(
                self.create_refresh_token(request, authentication.clone(), scopes, now)
                    .await?,
            )
        } else {
            None
        };
        let access_token = self
            .create_access_token(
                request,
                authentication,
                refresh_token.as_ref().map(|rt| rt.id.clone()),
                now,
            )
            .await?;
        Ok(GeneratedTokens::Tokens {
            access_token,
            refresh_token,
        })
    }

    /// A new access token from a refresh token, rotating it if the client renews.
    async fn refresh(
        &self,
        request: &GrantRequest,
        refresh_token_id: &str,
        now: OffsetDateTime,
    ) -> AuthResult<GeneratedTokens> {
        let authentication = authentication_of(request)?;
        if !request.registered_client.renew_refresh_token {
            let refresh_token_id = Some(refresh_token_id.to_string());
            let access_token = self
                .create_access_token(request, authentication, refresh_token_id, now)
                .await?;
            return Ok(GeneratedTokens::Tokens {
                access_token,
                refresh_token: None,
            });
        }

        let old = self
            .tickets
            .consume(refresh_token_id, TicketKind::RefreshToken)
            .await?
            .and_then(Ticket::into_refresh_token)
            .ok_or_else(|| AuthError::invalid_grant("refresh token is invalid or expired"))?;
        let renewed = self
            .create_refresh_token(request, authentication.clone(), old.scopes, now)
            .await?;
        debug!(client_id = %request.client_id, "Rotated refresh token");
        let access_token = self
            .create_access_token(request, authentication, Some(renewed.id.clone()), now)
            .await?;
        Ok(GeneratedTokens::Tokens {
            access_token,
            refresh_token: Some(renewed),
        })
    }

    async fn create_access_token(
        &self,
        request: &GrantRequest,
        authentication: Authentication,
        refresh_token_id: Option<String>,
        now: OffsetDateTime,
    ) -> AuthResult<AccessToken> {
        let expires_at = self.expires_at(
            TicketKind::AccessToken,
            request.ticket_granting_ticket.as_ref(),
            now,
        )?;
        let token = AccessToken {
            id: generate_ticket_id(TicketKind::AccessToken),
            client_id: request.client_id.clone(),
            service: request.service.clone(),
            authentication,
            scopes: request.scopes.clone(),
            refresh_token_id,
            ticket_granting_ticket: request.ticket_granting_ticket.clone(),
            created_at: now,
            expires_at,
        };
        self.tickets.create(Ticket::from(token.clone())).await?;
        Ok(token)
    }

    async fn create_refresh_token(
        &self,
        request: &GrantRequest,
        authentication: Authentication,
        scopes: BTreeSet<String>,
        now: OffsetDateTime,
    ) -> AuthResult<RefreshToken> {
        let expires_at = self.expires_at(
            TicketKind::RefreshToken,
            request.ticket_granting_ticket.as_ref(),
            now,
        )?;
        let token = RefreshToken {
            id: generate_ticket_id(TicketKind::RefreshToken),
            client_id: request.client_id.clone(),
            service: request.service.clone(),
            authentication,
            scopes,
            ticket_granting_ticket: request.ticket_granting_ticket.clone(),
            created_at: now,
            expires_at,
        };
        self.tickets.create(Ticket::from(token.clone())).await?;
        Ok(token)
    }

    async fn create_device_authorization(
        &self,
        request: &GrantRequest,
        now: OffsetDateTime,
    ) -> AuthResult<GeneratedTokens> {
        let expires_at = self.expires_at(TicketKind::DeviceToken, None, now)?;
        let device_code = generate_ticket_id(TicketKind::DeviceToken);
        let user_code = self.allocate_user_code(&device_code, now, expires_at).await?;

        let device_token = DeviceToken {
            id: device_code,
            user_code,
            client_id: request.client_id.clone(),
            service: request.service.clone(),
            scopes: request.scopes.clone(),
            approved: false,
            authentication: None,
            last_polled_at: None,
            created_at: now,
            expires_at,
        };
        self.tickets.create(Ticket::from(device_token.clone())).await?;
        Ok(GeneratedTokens::Device {
            device_token,
            interval: self.policies.device_refresh_interval(),
        })
    }

    /// Stores a fresh user code pointing at `device_code`.
    ///
    /// User codes are short, so collisions with live codes are retried.
    async fn allocate_user_code(
        &self,
        device_code: &str,
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> AuthResult<String> {
        for _ in 0..USER_CODE_ATTEMPTS {
            let user_code = generate_user_code(self.policies.user_code_length());
            if self.tickets.exists(&user_code).await? {
                continue;
            }
            let entry = DeviceUserCode {
                id: user_code.clone(),
                device_code: device_code.to_string(),
                created_at: now,
                expires_at,
            };
            match self.tickets.create(Ticket::from(entry)).await {
                Ok(()) => return Ok(user_code),
                Err(AuthError::DuplicateTicket { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(AuthError::internal("could not allocate a unique user code"))
    }

    /// Consumes an approved device token and its user code.
    async fn redeem_device_token(&self, device_code: &str) -> AuthResult<()> {
        let token = self
            .tickets
            .consume(device_code, TicketKind::DeviceToken)
            .await?
            .and_then(Ticket::into_device_token)
            .ok_or_else(|| AuthError::invalid_grant("device code is invalid or expired"))?;
        self.tickets.delete(&token.user_code).await?;
        Ok(())
    }

    fn expires_at(
        &self,
        kind: TicketKind,
        session: Option<&SsoSession>,
        now: OffsetDateTime,
    ) -> AuthResult<OffsetDateTime> {
        let ttl = self.policies.policy(kind).time_to_live_for(session, now);
        if ttl.is_zero() {
            return Err(AuthError::invalid_grant(
                "the SSO session backing this grant has ended",
            ));
        }
        Ok(now + ttl)
    }
}

fn authentication_of(request: &GrantRequest) -> AuthResult<Authentication> {
    request
        .authentication
        .clone()
        .ok_or_else(|| AuthError::internal("validated grant carries no authentication"))
}
