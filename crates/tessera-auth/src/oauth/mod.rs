//! OAuth 2.0 protocol types.
//!
//! - [`token`] - token endpoint request/response/error wire types
//! - [`pkce`] - PKCE challenge/verifier implementation

pub mod pkce;
pub mod token;

pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier};
pub use token::{
    DeviceAuthorizationResponse, TokenEndpointResponse, TokenError, TokenRequest, TokenResponse,
};
