//! Ports - interfaces the orchestrator depends on, implemented by infrastructure crates

mod protocol;
mod repositories;

pub use protocol::{ProtocolConnection, ProtocolConnector, ProtocolHandle};
pub use repositories::{CredentialSource, NoopObjectStore, ObjectStore, RecordSource, RepoResult};
