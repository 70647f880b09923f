//! # relay-gateway
//!
//! Multi-tenant session orchestrator: keeps one protocol session alive per tenant,
//! persists credentials across restarts, and relays events to per-tenant webhooks.

pub mod credentials;
pub mod events;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod webhook;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use credentials::{CredentialStore, LocalDiskCredentialSource};
pub use events::WebhookEventType;
pub use registry::{InstanceRegistry, LocalRecordFile, RecordStore};
pub use server::{run, GatewayState};
pub use session::{PairingArtifact, Session, SessionDeps, SessionPolicy, SessionSnapshot};
pub use webhook::{ReqwestTransport, WebhookDispatcher, WebhookPolicy, WebhookTransport};
