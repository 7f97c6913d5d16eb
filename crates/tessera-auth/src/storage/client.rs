//! Client registry trait.
//!
//! The engine consults registered clients read-only. Registration itself
//! happens elsewhere (configuration bootstrap, an admin API, a database).

use async_trait::async_trait;

use crate::AuthResult;
use crate::secret;
use crate::types::RegisteredClient;

/// Read-only lookup of registered clients.
///
/// # Example
///
/// ```ignore
/// use tessera_auth::storage::ClientRegistry;
///
/// async fn example(registry: &impl ClientRegistry) -> tessera_auth::AuthResult<()> {
///     if let Some(client) = registry.find_by_client_id("my-app").await? {
///         println!("Found client: {}", client.name);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Find a client by its OAuth client_id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>>;

    /// Verify a presented secret against the client's stored hash.
    ///
    /// Returns `false` for unknown clients and for public clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the stored hash is malformed.
    async fn verify_secret(&self, client_id: &str, presented: &str) -> AuthResult<bool> {
        let Some(client) = self.find_by_client_id(client_id).await? else {
            return Ok(false);
        };
        match client.client_secret.as_deref() {
            Some(hash) => Ok(secret::verify_secret(presented, hash)?),
            None => Ok(false),
        }
    }
}
