//! Registers the configured clients and users at startup.

use tessera_auth::secret::{SecretError, hash_secret};
use tessera_auth::types::{ClientValidationError, RegisteredClient};
use tessera_auth::{InMemoryClientRegistry, InMemoryUserAuthenticator};
use tracing::info;

use crate::config::{BootstrapClient, BootstrapConfig};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("client '{client_id}': {source}")]
    InvalidClient {
        client_id: String,
        #[source]
        source: ClientValidationError,
    },

    #[error("hashing secret for '{name}': {source}")]
    Hashing {
        name: String,
        #[source]
        source: SecretError,
    },
}

/// Builds the client registry, hashing plaintext secrets.
pub fn client_registry(config: &BootstrapConfig) -> Result<InMemoryClientRegistry, BootstrapError> {
    let registry = InMemoryClientRegistry::new();
    for client in &config.clients {
        let registered = registered_client(client)?;
        registry
            .register(registered)
            .map_err(|source| BootstrapError::InvalidClient {
                client_id: client.client_id.clone(),
                source,
            })?;
    }
    info!(clients = registry.len(), "Client registry bootstrapped");
    Ok(registry)
}

fn registered_client(client: &BootstrapClient) -> Result<RegisteredClient, BootstrapError> {
    let mut registered = RegisteredClient::new(&client.client_id, &client.service_id_pattern);
    if let Some(secret) = client.secret.as_deref().filter(|s| !s.is_empty()) {
        let hash = hash_secret(secret).map_err(|source| BootstrapError::Hashing {
            name: client.client_id.clone(),
            source,
        })?;
        registered.client_secret = Some(hash);
    }
    if let Some(name) = &client.name {
        registered.name = name.clone();
    }
    registered.allowed_grant_types = client.allowed_grant_types.clone();
    registered.allowed_response_types = client.allowed_response_types.clone();
    registered.scopes = client.scopes.clone();
    registered.jwt_access_token = client.jwt_access_token;
    registered.generate_refresh_token = client.generate_refresh_token;
    registered.renew_refresh_token = client.renew_refresh_token;
    Ok(registered)
}

/// Builds the resource-owner authenticator.
pub fn user_authenticator(
    config: &BootstrapConfig,
) -> Result<InMemoryUserAuthenticator, BootstrapError> {
    let users = InMemoryUserAuthenticator::new();
    for user in &config.users {
        users
            .add_user(&user.username, &user.password, user.attributes.clone())
            .map_err(|source| BootstrapError::Hashing {
                name: user.username.clone(),
                source,
            })?;
    }
    info!(users = config.users.len(), "User authenticator bootstrapped");
    Ok(users)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use tessera_auth::ClientRegistry;
    use tessera_auth::types::GrantType;

    use super::*;
    use crate::config::BootstrapUser;

    fn client(id: &str, secret: Option<&str>, pattern: &str) -> BootstrapClient {
        BootstrapClient {
            client_id: id.into(),
            secret: secret.map(Into::into),
            name: None,
            service_id_pattern: pattern.into(),
            allowed_grant_types: BTreeSet::from([GrantType::ClientCredentials]),
            allowed_response_types: BTreeSet::new(),
            scopes: Vec::new(),
            jwt_access_token: true,
            generate_refresh_token: false,
            renew_refresh_token: false,
        }
    }

    #[tokio::test]
    async fn test_client_secrets_are_hashed() {
        let mut spa = client("spa", None, ".*");
        spa.allowed_grant_types =
            BTreeSet::from([GrantType::AuthorizationCode, GrantType::RefreshToken]);
        let config = BootstrapConfig {
            clients: vec![client("web", Some("s3cret"), ".*"), spa],
            users: Vec::new(),
        };
        let registry = client_registry(&config).unwrap();
        let web = registry.find_by_client_id("web").await.unwrap().unwrap();
        assert!(web.is_confidential());
        assert_ne!(web.client_secret.as_deref(), Some("s3cret"));
        assert!(web.jwt_access_token);
        assert!(!web.generate_refresh_token);
        assert!(registry.verify_secret("web", "s3cret").await.unwrap());

        let spa = registry.find_by_client_id("spa").await.unwrap().unwrap();
        assert!(!spa.is_confidential());
        assert!(spa.is_grant_type_allowed(GrantType::AuthorizationCode));
    }

    #[test]
    fn test_public_client_credentials_is_reported() {
        let config = BootstrapConfig {
            clients: vec![client("spa", None, ".*")],
            users: Vec::new(),
        };
        let err = client_registry(&config).unwrap_err();
        match err {
            BootstrapError::InvalidClient { client_id, source } => {
                assert_eq!(client_id, "spa");
                assert_eq!(source, ClientValidationError::PublicClientCredentials);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = BootstrapConfig {
            clients: vec![client("web", Some("s3cret"), "(unclosed")],
            users: Vec::new(),
        };
        let err = client_registry(&config).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::InvalidClient {
                source: ClientValidationError::InvalidServicePattern(_),
                ..
            }
        ));
    }

    #[test]
    fn test_users_are_registered() {
        let config = BootstrapConfig {
            clients: Vec::new(),
            users: vec![BootstrapUser {
                username: "alice".into(),
                password: "wonderland".into(),
                attributes: BTreeMap::new(),
            }],
        };
        user_authenticator(&config).unwrap();
    }
}
