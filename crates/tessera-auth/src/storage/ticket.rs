//! Ticket store trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{Ticket, TicketKind};

// =============================================================================
// Ticket Store Trait
// =============================================================================

/// Key-value storage for tickets.
///
/// Implementations must treat a ticket past its `expires_at` as absent for
/// every read, even before [`cleanup_expired`](TicketStore::cleanup_expired)
/// has removed it. Lookups are typed: asking for an id under the wrong kind
/// returns nothing.
///
/// # Atomicity
///
/// [`consume`](TicketStore::consume) is the only way the engine redeems a
/// single-use ticket. It must check and remove in one step so that two
/// concurrent callers can never both receive the same ticket. Backends
/// implement it as a conditional delete, a transaction, or an equivalent
/// single operation.
///
/// [`modify`](TicketStore::modify) is the read-modify-write counterpart. The
/// engine uses it for every change to a ticket that another request may be
/// changing at the same time, such as device polls racing an approval.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persist a new ticket.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DuplicateTicket` if a live ticket with the same id
    /// exists, or `AuthError::Storage` if the backend fails.
    async fn create(&self, ticket: Ticket) -> AuthResult<()>;

    /// Fetch a live ticket by id and kind.
    async fn get(&self, id: &str, kind: TicketKind) -> AuthResult<Option<Ticket>>;

    /// Replace a live ticket of the same id and kind.
    ///
    /// Returns `false` if no such ticket exists.
    async fn update(&self, ticket: Ticket) -> AuthResult<bool>;

    /// Atomically apply `mutate` to a live ticket of `kind`.
    ///
    /// `mutate` sees the current stored value while the backend holds the
    /// ticket exclusively. If it returns `Err`, the ticket is left unchanged
    /// and the error is returned. Otherwise the mutated ticket is stored and
    /// a copy returned. Returns `Ok(None)` if no live ticket of `kind` exists.
    async fn modify(
        &self,
        id: &str,
        kind: TicketKind,
        mutate: &(dyn for<'t> Fn(&'t mut Ticket) -> AuthResult<()> + Send + Sync),
    ) -> AuthResult<Option<Ticket>>;

    /// Delete a ticket regardless of kind. Returns `true` if one was removed.
    async fn delete(&self, id: &str) -> AuthResult<bool>;

    /// Check whether a live ticket exists under `id`.
    async fn exists(&self, id: &str) -> AuthResult<bool>;

    /// Atomically remove and return a live ticket of `kind`.
    ///
    /// Returns `None` if the ticket is unknown, expired, of another kind, or
    /// was already consumed.
    async fn consume(&self, id: &str, kind: TicketKind) -> AuthResult<Option<Ticket>>;

    /// Remove every expired ticket. Returns the number removed.
    async fn cleanup_expired(&self) -> AuthResult<usize>;
}
