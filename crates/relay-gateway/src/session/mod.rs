//! Per-tenant session state machine
//!
//! A [`Session`] owns one protocol socket and walks it through
//! `disconnected -> connecting -> {requires_pairing, connected} -> disconnected`,
//! reconnecting with capped exponential backoff on transient closes.

mod identifiers;
mod pairing;
mod policy;
mod rate_limit;
mod session;
mod state;
mod watchdog;

pub use identifiers::{IdentifierCache, IdentifierMapping};
pub use pairing::PairingArtifact;
pub use policy::{ReconnectPolicy, SessionPolicy};
pub use rate_limit::RateLimiter;
pub use session::{Session, SessionDeps};
pub use state::{SessionSnapshot, StatusUpdate};
