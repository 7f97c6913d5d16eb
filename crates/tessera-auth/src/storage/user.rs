//! Resource owner authentication.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Authentication;

/// Authenticates end users by username and password.
///
/// Used by the password grant and by the device approval endpoint.
#[async_trait]
pub trait UserAuthenticator: Send + Sync {
    /// Returns the authentication on success, `None` on bad credentials.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backing store fails.
    async fn authenticate(&self, username: &str, password: &str)
    -> AuthResult<Option<Authentication>>;
}
