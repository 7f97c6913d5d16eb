//! The token issuance pipeline.
//!
//! ```text
//! TokenRequest ─► ExtractorRegistry ─► ValidatorChain ─► TokenGenerator ─► ResponseEncoder
//! ```
//!
//! [`TokenEngine`] owns one of each stage and the collaborators they share.
//! It also serves the operations that read tickets back: introspection,
//! profile, revocation and device approval.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::expiration::ExpirationPolicySet;
use crate::extract::{ExtractorContext, ExtractorRegistry};
use crate::oauth::{TokenEndpointResponse, TokenRequest};
use crate::storage::{ClientRegistry, TicketStore, UserAuthenticator};
use crate::token::{
    AccessTokenCipher, IntrospectionResponse, JwtError, Jwks, NewAuthorizationCode,
    ProfileResponse, ResponseEncoder, TokenGenerator, resolve_token_id,
};
use crate::types::{AuthorizationCode, GrantRequest, RegisteredClient, Ticket, TicketKind};
use crate::validate::{ValidatorChain, ValidatorContext};

/// Client credentials presented on introspection and revocation.
#[derive(Clone, Default)]
pub struct ClientCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// The token issuance engine.
pub struct TokenEngine {
    extractors: ExtractorRegistry,
    validators: ValidatorChain,
    extractor_context: ExtractorContext,
    validator_context: ValidatorContext,
    generator: TokenGenerator,
    encoder: ResponseEncoder,
    cipher: Option<Arc<AccessTokenCipher>>,
    clients: Arc<dyn ClientRegistry>,
    tickets: Arc<dyn TicketStore>,
    users: Arc<dyn UserAuthenticator>,
}

impl TokenEngine {
    /// Builds the engine, loading or generating the signing key from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing or encryption key is unusable.
    pub fn new(
        config: &AuthConfig,
        clients: Arc<dyn ClientRegistry>,
        tickets: Arc<dyn TicketStore>,
        users: Arc<dyn UserAuthenticator>,
    ) -> Result<Self, JwtError> {
        let cipher = AccessTokenCipher::from_config(config)?;
        Ok(Self::with_cipher(
            config,
            clients,
            tickets,
            users,
            Some(Arc::new(cipher)),
        ))
    }

    /// Builds the engine with an explicit cipher. Without one, clients that
    /// want JWT access tokens get `server_error`.
    #[must_use]
    pub fn with_cipher(
        config: &AuthConfig,
        clients: Arc<dyn ClientRegistry>,
        tickets: Arc<dyn TicketStore>,
        users: Arc<dyn UserAuthenticator>,
        cipher: Option<Arc<AccessTokenCipher>>,
    ) -> Self {
        let policies = Arc::new(ExpirationPolicySet::from_config(&config.oauth));
        Self {
            extractors: ExtractorRegistry::with_defaults(),
            validators: ValidatorChain::with_defaults(),
            extractor_context: ExtractorContext::new(clients.clone(), tickets.clone()),
            validator_context: ValidatorContext::new(
                clients.clone(),
                tickets.clone(),
                users.clone(),
                policies.clone(),
            ),
            generator: TokenGenerator::new(tickets.clone(), policies),
            encoder: ResponseEncoder::new(cipher.clone(), config.device_verification_uri()),
            cipher,
            clients,
            tickets,
            users,
        }
    }

    /// Replaces the extractor registry.
    #[must_use]
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    /// Replaces the validator chain.
    #[must_use]
    pub fn with_validators(mut self, validators: ValidatorChain) -> Self {
        self.validators = validators;
        self
    }

    #[must_use]
    pub fn tickets(&self) -> &Arc<dyn TicketStore> {
        &self.tickets
    }

    /// The published verification keys, if tokens are signed.
    #[must_use]
    pub fn jwks(&self) -> Option<Jwks> {
        self.cipher.as_ref().map(|c| c.jwks())
    }

    /// Runs a token, device authorization or implicit request through the pipeline.
    ///
    /// # Errors
    ///
    /// The OAuth error of the first stage that rejects the request.
    pub async fn handle(&self, request: TokenRequest) -> AuthResult<TokenEndpointResponse> {
        debug!(
            grant_type = ?request.grant_type,
            response_type = ?request.response_type,
            client_id = ?request.client_id,
            "Processing token request"
        );
        let client_id = request.client_id.clone().unwrap_or_default();
        let flow = request
            .grant_type
            .clone()
            .or_else(|| request.response_type.clone())
            .unwrap_or_default();

        match self.run(&request).await {
            Ok((grant, response)) => {
                info!(
                    client_id = %grant.client_id,
                    grant_type = grant.flow(),
                    service = %grant.service,
                    "Token issued"
                );
                Ok(response)
            }
            Err(e) if e.is_retryable() => {
                debug!(client_id = %client_id, grant_type = %flow, error = %e, "Device poll");
                Err(e)
            }
            Err(e) => {
                warn!(
                    client_id = %client_id,
                    grant_type = %flow,
                    error = %e,
                    "Token request rejected"
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: &TokenRequest,
    ) -> AuthResult<(GrantRequest, TokenEndpointResponse)> {
        let mut grant = self
            .extractors
            .extract(request, &self.extractor_context)
            .await?;
        self.validators
            .validate(&mut grant, &self.validator_context)
            .await?;
        let generated = self.generator.generate(&grant).await?;
        let response = self.encoder.encode(&grant.registered_client, generated)?;
        Ok((grant, response))
    }

    /// Issues an authorization code for the authorize flow.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the store fails.
    pub async fn create_authorization_code(
        &self,
        code: NewAuthorizationCode,
    ) -> AuthResult<AuthorizationCode> {
        self.generator.create_authorization_code(code).await
    }

    /// Describes a token for an authenticated client (RFC 7662).
    ///
    /// # Errors
    ///
    /// `invalid_client` if the caller fails to authenticate; the token
    /// itself never causes an error.
    pub async fn introspect(
        &self,
        credentials: &ClientCredentials,
        token: &str,
    ) -> AuthResult<IntrospectionResponse> {
        let caller = self.authenticate_caller(credentials).await?;
        let response = match self.find_token(token).await? {
            Some(Ticket::AccessToken(at)) => IntrospectionResponse::for_access_token(&at),
            Some(Ticket::RefreshToken(rt)) => IntrospectionResponse::for_refresh_token(&rt),
            _ => IntrospectionResponse::inactive(),
        };
        debug!(client_id = %caller.client_id, active = response.active, "Introspected token");
        Ok(response)
    }

    /// The profile behind a bearer access token.
    ///
    /// # Errors
    ///
    /// `invalid_token` if the token is unknown, expired or not an access token.
    pub async fn profile(&self, bearer: &str) -> AuthResult<ProfileResponse> {
        let Some(id) = resolve_token_id(self.cipher.as_deref(), bearer) else {
            return Err(AuthError::invalid_token("access token cannot be verified"));
        };
        self.tickets
            .get(&id, TicketKind::AccessToken)
            .await?
            .and_then(Ticket::into_access_token)
            .map(|at| ProfileResponse::from(&at))
            .ok_or_else(|| AuthError::invalid_token("access token is invalid or expired"))
    }

    /// Revokes an access or refresh token owned by the calling client (RFC 7009).
    ///
    /// Unknown tokens and tokens of other clients are ignored.
    ///
    /// # Errors
    ///
    /// `invalid_client` if the caller fails to authenticate.
    pub async fn revoke(&self, credentials: &ClientCredentials, token: &str) -> AuthResult<()> {
        let caller = self.authenticate_caller(credentials).await?;
        let Some(ticket) = self.find_token(token).await? else {
            debug!(client_id = %caller.client_id, "Revocation of unknown token ignored");
            return Ok(());
        };
        if ticket.client_id() != Some(caller.client_id.as_str()) {
            warn!(client_id = %caller.client_id, "Client tried to revoke a foreign token");
            return Ok(());
        }
        self.tickets.delete(ticket.id()).await?;
        info!(client_id = %caller.client_id, kind = %ticket.kind(), "Token revoked");
        Ok(())
    }

    /// Approves the device authorization behind `user_code` for a user.
    ///
    /// # Errors
    ///
    /// - `invalid_grant` for bad user credentials or an unknown or expired user code
    /// - `invalid_request` if the code was already approved
    pub async fn approve_device(
        &self,
        user_code: &str,
        username: &str,
        password: &str,
    ) -> AuthResult<()> {
        let authentication = self
            .users
            .authenticate(username, password)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("invalid user credentials"))?;

        let invalid = || AuthError::invalid_grant("user code is invalid or expired");
        let entry = self
            .tickets
            .get(user_code, TicketKind::DeviceUserCode)
            .await?
            .and_then(Ticket::into_device_user_code)
            .ok_or_else(invalid)?;
        let approve = |ticket: &mut Ticket| -> AuthResult<()> {
            let token = ticket.as_device_token_mut().ok_or_else(invalid)?;
            if token.approved {
                return Err(AuthError::invalid_request("user code was already approved"));
            }
            token.approved = true;
            token.authentication = Some(authentication.clone());
            Ok(())
        };
        let client_id = self
            .tickets
            .modify(&entry.device_code, TicketKind::DeviceToken, &approve)
            .await?
            .and_then(Ticket::into_device_token)
            .map(|token| token.client_id)
            .ok_or_else(invalid)?;
        info!(client_id = %client_id, principal = %username, "Device authorization approved");
        Ok(())
    }

    /// Removes expired tickets from the store.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the store fails.
    pub async fn cleanup_expired(&self) -> AuthResult<usize> {
        self.tickets.cleanup_expired().await
    }

    /// Looks up a live access or refresh token by its wire value.
    async fn find_token(&self, token: &str) -> AuthResult<Option<Ticket>> {
        let Some(id) = resolve_token_id(self.cipher.as_deref(), token) else {
            return Ok(None);
        };
        if let Some(at) = self.tickets.get(&id, TicketKind::AccessToken).await? {
            return Ok(Some(at));
        }
        self.tickets.get(&id, TicketKind::RefreshToken).await
    }

    /// Authenticates a client calling introspection or revocation.
    ///
    /// Confidential clients must present their secret.
    async fn authenticate_caller(
        &self,
        credentials: &ClientCredentials,
    ) -> AuthResult<RegisteredClient> {
        let client_id = credentials
            .client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AuthError::invalid_client("client authentication is required"))?;
        let client = self
            .clients
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client(format!("unknown client '{client_id}'")))?;

        match credentials.client_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) if self.clients.verify_secret(client_id, secret).await? => Ok(client),
            Some(_) => Err(AuthError::invalid_client("client authentication failed")),
            None if client.is_confidential() => Err(AuthError::invalid_client(format!(
                "client '{client_id}' must authenticate"
            ))),
            None => Ok(client),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::time::Duration;

    use super::*;
    use crate::oauth::{PkceChallenge, PkceChallengeMethod, PkceVerifier, TokenResponse};
    use crate::secret::hash_secret;
    use crate::storage::{InMemoryClientRegistry, InMemoryTicketStore, InMemoryUserAuthenticator};
    use crate::token::{JwtService, SigningKeyPair};
    use crate::types::{Authentication, DEVICE_CODE_GRANT_URN, GrantType, ResponseType, Service};

    const WEB_SECRET: &str = "web-secret";

    struct Fixture {
        engine: Arc<TokenEngine>,
        tickets: Arc<InMemoryTicketStore>,
        cipher: Arc<AccessTokenCipher>,
    }

    /// Clients:
    /// - `web`: confidential, JWT access tokens, rotating refresh tokens
    /// - `spa`: public, PKCE
    /// - `tv`: public, device flow only
    /// - `app`: public, opaque tokens, every grant
    /// - `cli`: public, authorization code only
    fn fixture_with(config: AuthConfig) -> Fixture {
        let tickets = Arc::new(InMemoryTicketStore::new());
        fixture_over(config, tickets.clone(), tickets)
    }

    /// Builds the engine over `store`, which must be backed by `tickets`.
    fn fixture_over(
        config: AuthConfig,
        tickets: Arc<InMemoryTicketStore>,
        store: Arc<dyn TicketStore>,
    ) -> Fixture {
        let clients = InMemoryClientRegistry::new();
        let mut web = RegisteredClient::new("web", "https://web\\.example\\.com/.*");
        web.client_secret = Some(hash_secret(WEB_SECRET).unwrap());
        web.jwt_access_token = true;
        web.renew_refresh_token = true;
        clients.register(web).unwrap();

        clients
            .register(RegisteredClient::new("spa", "https://spa\\.example\\.com/cb"))
            .unwrap();

        let mut tv = RegisteredClient::new("tv", "urn:tv");
        tv.allowed_grant_types = BTreeSet::from([GrantType::DeviceCode]);
        tv.allowed_response_types = BTreeSet::from([ResponseType::DeviceCode]);
        clients.register(tv).unwrap();

        clients
            .register(RegisteredClient::new("app", "urn:app"))
            .unwrap();

        let mut cli = RegisteredClient::new("cli", "urn:cli");
        cli.allowed_grant_types = BTreeSet::from([GrantType::AuthorizationCode]);
        clients.register(cli).unwrap();

        let users = InMemoryUserAuthenticator::new();
        users
            .add_user(
                "alice",
                "wonderland",
                BTreeMap::from([("email".to_string(), serde_json::json!("alice@example.com"))]),
            )
            .unwrap();

        let key = SigningKeyPair::generate_ec().unwrap();
        let cipher = Arc::new(AccessTokenCipher::new(
            JwtService::new(key, &config.issuer),
            None,
        ));
        let engine = TokenEngine::with_cipher(
            &config,
            Arc::new(clients),
            store,
            Arc::new(users),
            Some(cipher.clone()),
        );
        Fixture {
            engine: Arc::new(engine),
            tickets,
            cipher,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(AuthConfig::default())
    }

    fn token(response: TokenEndpointResponse) -> TokenResponse {
        match response {
            TokenEndpointResponse::Token(token) => token,
            TokenEndpointResponse::Device(_) => panic!("expected a token response"),
        }
    }

    async fn issue_code(
        fixture: &Fixture,
        client_id: &str,
        service: &str,
        challenge: Option<PkceChallenge>,
    ) -> String {
        fixture
            .engine
            .create_authorization_code(NewAuthorizationCode {
                client_id: client_id.into(),
                service: Service::new(service),
                authentication: Authentication::new(
                    "alice",
                    BTreeMap::from([("email".to_string(), serde_json::json!("alice@example.com"))]),
                ),
                scopes: BTreeSet::from(["openid".to_string()]),
                code_challenge: challenge,
                ticket_granting_ticket: None,
            })
            .await
            .unwrap()
            .id
    }

    fn code_request(client_id: &str, code: &str, redirect_uri: &str) -> TokenRequest {
        let mut request = TokenRequest::grant("authorization_code");
        request.client_id = Some(client_id.into());
        request.code = Some(code.into());
        request.redirect_uri = Some(redirect_uri.into());
        request
    }

    #[tokio::test]
    async fn test_authorization_code_flow_issues_jwt_with_ticket_id() {
        let fixture = fixture();
        let code = issue_code(&fixture, "web", "https://web.example.com/cb", None).await;
        let mut request = code_request("web", &code, "https://web.example.com/cb");
        request.client_secret = Some(WEB_SECRET.into());

        let response = token(fixture.engine.handle(request.clone()).await.unwrap());
        assert!(response.refresh_token.is_some());
        assert_eq!(response.scope, "openid");

        let claims = fixture.cipher.decode(&response.access_token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.aud, "https://web.example.com/cb");
        assert!(
            fixture
                .tickets
                .get(&claims.jti, TicketKind::AccessToken)
                .await
                .unwrap()
                .is_some()
        );

        let err = fixture.engine.handle(request).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_concurrent_code_redemption_mints_one_token() {
        let fixture = fixture();
        let verifier = PkceVerifier::generate();
        let challenge = PkceChallenge::from_verifier(&verifier, PkceChallengeMethod::S256);
        let code = issue_code(&fixture, "spa", "https://spa.example.com/cb", Some(challenge)).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let engine = fixture.engine.clone();
            let mut request = code_request("spa", &code, "https://spa.example.com/cb");
            request.code_verifier = Some(verifier.as_str().to_string());
            handles.push(tokio::spawn(async move { engine.handle(request).await }));
        }
        let mut issued = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => issued += 1,
                Err(e) => assert_eq!(e.oauth_error_code(), "invalid_grant"),
            }
        }
        assert_eq!(issued, 1);
    }

    #[tokio::test]
    async fn test_pkce_mismatch_is_invalid_grant() {
        let fixture = fixture();
        let verifier = PkceVerifier::generate();
        let challenge = PkceChallenge::from_verifier(&verifier, PkceChallengeMethod::S256);
        let code = issue_code(&fixture, "spa", "https://spa.example.com/cb", Some(challenge)).await;

        let mut request = code_request("spa", &code, "https://spa.example.com/cb");
        request.code_verifier = Some(PkceVerifier::generate().as_str().to_string());
        let err = fixture.engine.handle(request).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_refresh_rotation_invalidates_old_token() {
        let fixture = fixture();
        let code = issue_code(&fixture, "web", "https://web.example.com/cb", None).await;
        let mut request = code_request("web", &code, "https://web.example.com/cb");
        request.client_secret = Some(WEB_SECRET.into());
        let first = token(fixture.engine.handle(request).await.unwrap());
        let old = first.refresh_token.unwrap();

        let mut refresh = TokenRequest::grant("refresh_token");
        refresh.client_id = Some("web".into());
        refresh.client_secret = Some(WEB_SECRET.into());
        refresh.refresh_token = Some(old.clone());
        let second = token(fixture.engine.handle(refresh.clone()).await.unwrap());
        let renewed = second.refresh_token.unwrap();
        assert_ne!(renewed, old);

        let err = fixture.engine.handle(refresh).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_refresh_without_renew_keeps_token_reusable() {
        let fixture = fixture();
        let mut password = TokenRequest::grant("password");
        password.client_id = Some("app".into());
        password.username = Some("alice".into());
        password.password = Some("wonderland".into());
        let first = token(fixture.engine.handle(password).await.unwrap());
        let rt = first.refresh_token.unwrap();

        let mut refresh = TokenRequest::grant("refresh_token");
        refresh.client_id = Some("app".into());
        refresh.refresh_token = Some(rt.clone());
        for _ in 0..2 {
            let response = token(fixture.engine.handle(refresh.clone()).await.unwrap());
            assert!(response.refresh_token.is_none());
        }
        assert!(fixture.tickets.exists(&rt).await.unwrap());
    }

    async fn start_device_flow(fixture: &Fixture) -> (String, String) {
        let mut request = TokenRequest::response("device_code");
        request.client_id = Some("tv".into());
        match fixture.engine.handle(request).await.unwrap() {
            TokenEndpointResponse::Device(device) => {
                assert_eq!(device.verification_uri, "http://localhost:8443/sso/oauth2.0/device");
                assert_eq!(device.expires_in, 300);
                (device.device_code, device.user_code)
            }
            TokenEndpointResponse::Token(_) => panic!("expected a device response"),
        }
    }

    fn poll_request(device_code: &str) -> TokenRequest {
        let mut request = TokenRequest::grant(DEVICE_CODE_GRANT_URN);
        request.client_id = Some("tv".into());
        request.device_code = Some(device_code.into());
        request
    }

    #[tokio::test]
    async fn test_device_flow_end_to_end() {
        let mut config = AuthConfig::default();
        config.oauth.device_token.refresh_interval = Duration::ZERO;
        let fixture = fixture_with(config);
        let (device_code, user_code) = start_device_flow(&fixture).await;

        let err = fixture
            .engine
            .handle(poll_request(&device_code))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "authorization_pending");

        let err = fixture
            .engine
            .approve_device(&user_code, "alice", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
        fixture
            .engine
            .approve_device(&user_code, "alice", "wonderland")
            .await
            .unwrap();
        let err = fixture
            .engine
            .approve_device(&user_code, "alice", "wonderland")
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");

        let response = token(
            fixture
                .engine
                .handle(poll_request(&device_code))
                .await
                .unwrap(),
        );
        let profile = fixture.engine.profile(&response.access_token).await.unwrap();
        assert_eq!(profile.id, "alice");
        assert_eq!(profile.client_id, "tv");
        assert!(!fixture.tickets.exists(&device_code).await.unwrap());
        assert!(!fixture.tickets.exists(&user_code).await.unwrap());

        let err = fixture
            .engine
            .handle(poll_request(&device_code))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_rapid_device_polling_is_slow_down() {
        let fixture = fixture();
        let (device_code, _) = start_device_flow(&fixture).await;
        let first = fixture
            .engine
            .handle(poll_request(&device_code))
            .await
            .unwrap_err();
        assert_eq!(first.oauth_error_code(), "authorization_pending");
        let second = fixture
            .engine
            .handle(poll_request(&device_code))
            .await
            .unwrap_err();
        assert_eq!(second.oauth_error_code(), "slow_down");
    }

    /// Store whose device token updates wait before reaching the backend
    /// while the token is still unapproved.
    struct SlowDeviceStore {
        inner: Arc<InMemoryTicketStore>,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl TicketStore for SlowDeviceStore {
        async fn create(&self, ticket: Ticket) -> AuthResult<()> {
            self.inner.create(ticket).await
        }

        async fn get(&self, id: &str, kind: TicketKind) -> AuthResult<Option<Ticket>> {
            self.inner.get(id, kind).await
        }

        async fn update(&self, ticket: Ticket) -> AuthResult<bool> {
            self.inner.update(ticket).await
        }

        async fn modify(
            &self,
            id: &str,
            kind: TicketKind,
            mutate: &(dyn for<'t> Fn(&'t mut Ticket) -> AuthResult<()> + Send + Sync),
        ) -> AuthResult<Option<Ticket>> {
            let pending = self
                .inner
                .get(id, kind)
                .await?
                .and_then(Ticket::into_device_token)
                .is_some_and(|token| !token.approved);
            if pending {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.modify(id, kind, mutate).await
        }

        async fn delete(&self, id: &str) -> AuthResult<bool> {
            self.inner.delete(id).await
        }

        async fn exists(&self, id: &str) -> AuthResult<bool> {
            self.inner.exists(id).await
        }

        async fn consume(&self, id: &str, kind: TicketKind) -> AuthResult<Option<Ticket>> {
            self.inner.consume(id, kind).await
        }

        async fn cleanup_expired(&self) -> AuthResult<usize> {
            self.inner.cleanup_expired().await
        }
    }

    #[tokio::test]
    async fn test_approval_survives_concurrent_poll() {
        let mut config = AuthConfig::default();
        config.oauth.device_token.refresh_interval = Duration::ZERO;
        let tickets = Arc::new(InMemoryTicketStore::new());
        let store = Arc::new(SlowDeviceStore {
            inner: tickets.clone(),
            delay: Duration::from_millis(200),
        });
        let fixture = fixture_over(config, tickets, store);
        let (device_code, user_code) = start_device_flow(&fixture).await;

        let engine = fixture.engine.clone();
        let poll_code = device_code.clone();
        let poll = tokio::spawn(async move { engine.handle(poll_request(&poll_code)).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        fixture
            .engine
            .approve_device(&user_code, "alice", "wonderland")
            .await
            .unwrap();
        let response = match poll.await.unwrap() {
            Ok(response) => token(response),
            Err(e) => {
                assert_eq!(e.oauth_error_code(), "authorization_pending");
                token(
                    fixture
                        .engine
                        .handle(poll_request(&device_code))
                        .await
                        .unwrap(),
                )
            }
        };
        let profile = fixture.engine.profile(&response.access_token).await.unwrap();
        assert_eq!(profile.id, "alice");
        assert_eq!(profile.client_id, "tv");
    }

    #[tokio::test]
    async fn test_concurrent_approvals_single_winner() {
        let fixture = fixture();
        let (device_code, user_code) = start_device_flow(&fixture).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = fixture.engine.clone();
            let user_code = user_code.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .approve_device(&user_code, "alice", "wonderland")
                    .await
            }));
        }
        let mut approved = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => approved += 1,
                Err(e) => assert_eq!(e.oauth_error_code(), "invalid_request"),
            }
        }
        assert_eq!(approved, 1);
        let stored = fixture
            .tickets
            .get(&device_code, TicketKind::DeviceToken)
            .await
            .unwrap()
            .and_then(Ticket::into_device_token)
            .unwrap();
        assert!(stored.approved);
    }

    #[tokio::test]
    async fn test_password_grant_gated_by_client_policy() {
        let fixture = fixture();
        let mut request = TokenRequest::grant("password");
        request.client_id = Some("cli".into());
        request.username = Some("alice".into());
        request.password = Some("wonderland".into());
        let err = fixture.engine.handle(request).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "unauthorized_client");
    }

    #[tokio::test]
    async fn test_unsupported_grant_type() {
        let fixture = fixture();
        let mut request = TokenRequest::grant("urn:example:magic");
        request.client_id = Some("app".into());
        let err = fixture.engine.handle(request).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "unsupported_grant_type");
    }

    #[tokio::test]
    async fn test_introspection_and_revocation() {
        let fixture = fixture();
        let mut request = TokenRequest::grant("client_credentials");
        request.client_id = Some("web".into());
        request.client_secret = Some(WEB_SECRET.into());
        request.service = Some("https://web.example.com/api".into());
        let response = token(fixture.engine.handle(request).await.unwrap());

        let web = ClientCredentials {
            client_id: Some("web".into()),
            client_secret: Some(WEB_SECRET.into()),
        };
        let active = fixture
            .engine
            .introspect(&web, &response.access_token)
            .await
            .unwrap();
        assert!(active.active);
        assert_eq!(active.sub.as_deref(), Some("web"));
        assert_eq!(active.client_id.as_deref(), Some("web"));

        let unauthenticated = ClientCredentials {
            client_id: Some("web".into()),
            client_secret: None,
        };
        let err = fixture
            .engine
            .introspect(&unauthenticated, &response.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client");

        // a foreign client cannot revoke
        let app = ClientCredentials {
            client_id: Some("app".into()),
            client_secret: None,
        };
        fixture
            .engine
            .revoke(&app, &response.access_token)
            .await
            .unwrap();
        assert!(
            fixture
                .engine
                .introspect(&web, &response.access_token)
                .await
                .unwrap()
                .active
        );

        fixture
            .engine
            .revoke(&web, &response.access_token)
            .await
            .unwrap();
        let inactive = fixture
            .engine
            .introspect(&web, &response.access_token)
            .await
            .unwrap();
        assert_eq!(inactive, IntrospectionResponse::inactive());
        let err = fixture
            .engine
            .profile(&response.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_token");
    }
}
