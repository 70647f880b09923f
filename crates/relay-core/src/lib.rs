//! # relay-core
//!
//! Domain layer containing tenant identity, session records, credentials, protocol
//! events, and the port traits implemented by the infrastructure crates.
//! This crate has zero dependencies on infrastructure (database, cache, HTTP).

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Credentials, InboundMedia, InboundMessage, OutboundContent, ProtocolEvent, SessionRecord,
    SessionStatus, StateChange,
};
pub use error::DomainError;
pub use traits::{
    CredentialSource, NoopObjectStore, ObjectStore, ProtocolConnection, ProtocolConnector,
    ProtocolHandle, RecordSource, RepoResult,
};
pub use value_objects::{TenantId, TenantIdError};
