//! Storage contracts consumed by the engine, and in-memory backends.

pub mod client;
pub mod memory;
pub mod ticket;
pub mod user;

pub use client::ClientRegistry;
pub use memory::{InMemoryClientRegistry, InMemoryTicketStore, InMemoryUserAuthenticator};
pub use ticket::TicketStore;
pub use user::UserAuthenticator;
