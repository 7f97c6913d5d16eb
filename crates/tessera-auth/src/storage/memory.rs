//! In-memory storage backends.
//!
//! Concurrent maps from `dashmap`. Suitable for single-process deployments
//! and tests; nothing survives a restart.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use super::{ClientRegistry, TicketStore, UserAuthenticator};
use crate::AuthResult;
use crate::error::AuthError;
use crate::secret::{self, SecretError};
use crate::types::{Authentication, ClientValidationError, RegisteredClient, Ticket, TicketKind};

// =============================================================================
// Ticket Store
// =============================================================================

/// Ticket store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: DashMap<String, Ticket>,
}

impl InMemoryTicketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tickets, expired ones included until swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

fn is_live(ticket: &Ticket, kind: TicketKind, now: OffsetDateTime) -> bool {
    ticket.kind() == kind && !ticket.is_expired_at(now)
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn create(&self, ticket: Ticket) -> AuthResult<()> {
        let now = OffsetDateTime::now_utc();
        match self.tickets.entry(ticket.id().to_string()) {
            Entry::Occupied(existing) if !existing.get().is_expired_at(now) => {
                Err(AuthError::duplicate_ticket(existing.key().as_str()))
            }
            Entry::Occupied(mut stale) => {
                stale.insert(ticket);
                Ok(())
            }
            Entry::Vacant(slot) => {
                slot.insert(ticket);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str, kind: TicketKind) -> AuthResult<Option<Ticket>> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .tickets
            .get(id)
            .filter(|entry| is_live(entry.value(), kind, now))
            .map(|entry| entry.value().clone()))
    }

    async fn update(&self, ticket: Ticket) -> AuthResult<bool> {
        let now = OffsetDateTime::now_utc();
        let kind = ticket.kind();
        match self.tickets.get_mut(ticket.id()) {
            Some(mut entry) if is_live(entry.value(), kind, now) => {
                *entry = ticket;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn modify(
        &self,
        id: &str,
        kind: TicketKind,
        mutate: &(dyn for<'t> Fn(&'t mut Ticket) -> AuthResult<()> + Send + Sync),
    ) -> AuthResult<Option<Ticket>> {
        let now = OffsetDateTime::now_utc();
        // get_mut holds the shard write lock until the guard drops
        let Some(mut entry) = self.tickets.get_mut(id) else {
            return Ok(None);
        };
        if !is_live(entry.value(), kind, now) {
            return Ok(None);
        }
        let mut next = entry.value().clone();
        mutate(&mut next)?;
        *entry = next.clone();
        Ok(Some(next))
    }

    async fn delete(&self, id: &str) -> AuthResult<bool> {
        Ok(self.tickets.remove(id).is_some())
    }

    async fn exists(&self, id: &str) -> AuthResult<bool> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .tickets
            .get(id)
            .is_some_and(|entry| !entry.is_expired_at(now)))
    }

    async fn consume(&self, id: &str, kind: TicketKind) -> AuthResult<Option<Ticket>> {
        let now = OffsetDateTime::now_utc();
        // remove_if holds the shard write lock across check and removal
        Ok(self
            .tickets
            .remove_if(id, |_, ticket| is_live(ticket, kind, now))
            .map(|(_, ticket)| ticket))
    }

    async fn cleanup_expired(&self) -> AuthResult<usize> {
        let now = OffsetDateTime::now_utc();
        let mut removed = 0;
        self.tickets.retain(|_, ticket| {
            let keep = !ticket.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

// =============================================================================
// Client Registry
// =============================================================================

/// Client registry backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryClientRegistry {
    clients: DashMap<String, RegisteredClient>,
}

impl InMemoryClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a client after validating it.
    ///
    /// # Errors
    ///
    /// Returns the validation error if the registration is invalid.
    pub fn register(&self, client: RegisteredClient) -> Result<(), ClientValidationError> {
        client.validate()?;
        self.clients.insert(client.client_id.clone(), client);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ClientRegistry for InMemoryClientRegistry {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }
}

// =============================================================================
// User Authenticator
// =============================================================================

#[derive(Debug, Clone)]
struct StoredUser {
    password_hash: String,
    attributes: BTreeMap<String, serde_json::Value>,
}

/// Username/password authenticator over a fixed user list.
#[derive(Debug, Default)]
pub struct InMemoryUserAuthenticator {
    users: DashMap<String, StoredUser>,
}

impl InMemoryUserAuthenticator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user, hashing the password.
    ///
    /// # Errors
    ///
    /// Returns `SecretError` if hashing fails.
    pub fn add_user(
        &self,
        username: impl Into<String>,
        password: &str,
        attributes: BTreeMap<String, serde_json::Value>,
    ) -> Result<(), SecretError> {
        let password_hash = secret::hash_secret(password)?;
        self.users.insert(
            username.into(),
            StoredUser {
                password_hash,
                attributes,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl UserAuthenticator for InMemoryUserAuthenticator {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> AuthResult<Option<Authentication>> {
        let Some(user) = self.users.get(username).map(|u| u.value().clone()) else {
            return Ok(None);
        };
        if secret::verify_secret(password, &user.password_hash)? {
            Ok(Some(Authentication::new(username, user.attributes)))
        } else {
            Ok(None)
        }
    }
}
