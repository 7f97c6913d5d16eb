//! Token generation, encoding and inspection.
//!
//! - [`generator`] - creates and persists tickets for a validated grant
//! - [`encoder`] - renders tickets as token endpoint responses
//! - [`jwt`] / [`cipher`] - signed and optionally encrypted JWT access tokens
//! - [`introspection`] - introspection and profile responses

pub mod cipher;
pub mod encoder;
pub mod generator;
pub mod introspection;
pub mod jwt;

pub use cipher::{AccessTokenCipher, looks_like_jwt};
pub use encoder::{ResponseEncoder, claims_for};
pub use generator::{GeneratedTokens, NewAuthorizationCode, TokenGenerator};
pub use introspection::{IntrospectionResponse, ProfileResponse, resolve_token_id};
pub use jwt::{
    AccessTokenClaims, JwtError, JwtService, Jwk, Jwks, SigningAlgorithm, SigningKeyPair,
};
