//! # tessera-auth
//!
//! OAuth 2.0 / OpenID Connect token issuance engine.
//!
//! This crate provides:
//! - One pipeline for every grant: authorization code (with or without PKCE),
//!   refresh token, password, client credentials, device code and implicit
//! - Per-client authorization policy
//! - Ticket lifecycle with sovereign and SSO-bound expiration
//! - Opaque or signed (optionally encrypted) JWT access tokens
//! - Introspection, profile, revocation and device approval
//!
//! ## Overview
//!
//! A [`TokenRequest`](oauth::TokenRequest) enters [`TokenEngine::handle`]. The
//! first [`GrantExtractor`](extract::GrantExtractor) that supports it builds a
//! [`GrantRequest`](types::GrantRequest), the first supporting
//! [`GrantValidator`](validate::GrantValidator) checks it, the
//! [`TokenGenerator`](token::TokenGenerator) persists tickets, and the
//! [`ResponseEncoder`](token::ResponseEncoder) renders the response.
//!
//! ## Modules
//!
//! - [`config`] - Engine configuration
//! - [`engine`] - The pipeline facade
//! - [`error`] - OAuth error taxonomy
//! - [`expiration`] - Ticket expiration policies
//! - [`extract`] - Grant extractors
//! - [`validate`] - Grant validators
//! - [`token`] - Generation, encoding, JWT and introspection
//! - [`storage`] - Ticket store, client registry and user authenticator contracts
//! - [`http`] - Axum HTTP handlers for the OAuth endpoints

pub mod config;
pub mod engine;
pub mod error;
pub mod expiration;
pub mod extract;
pub mod http;
pub mod oauth;
pub mod secret;
pub mod storage;
pub mod token;
pub mod types;
pub mod validate;

pub use config::{AuthConfig, ConfigError};
pub use engine::{ClientCredentials, TokenEngine};
pub use error::{AuthError, ErrorCategory};
pub use http::{OAuthState, router};
pub use storage::{
    ClientRegistry, InMemoryClientRegistry, InMemoryTicketStore, InMemoryUserAuthenticator,
    TicketStore, UserAuthenticator,
};
pub use types::{GrantType, RegisteredClient, ResponseType};

/// Type alias for token issuance results.
pub type AuthResult<T> = Result<T, AuthError>;
