//! Domain types shared across the pipeline.

pub mod client;
pub mod grant;
pub mod ticket;

pub use client::{
    ClientValidationError, DEVICE_CODE_GRANT_URN, GrantType, RegisteredClient, ResponseType,
};
pub use grant::{GrantInput, GrantRequest, join_scopes, parse_scopes};
pub use ticket::{
    AccessToken, Authentication, AuthorizationCode, DeviceToken, DeviceUserCode, Principal,
    RefreshToken, Service, SsoSession, Ticket, TicketKind, generate_ticket_id, generate_user_code,
};
