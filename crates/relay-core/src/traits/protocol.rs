//! Protocol session port
//!
//! The wire-level chat protocol and its cryptography live behind these traits. A
//! connector opens one socket per tenant and hands back a handle for outbound calls
//! plus the ordered stream of events the socket produces.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::RepoResult;
use crate::entities::{Credentials, OutboundContent, ProtocolEvent};
use crate::value_objects::TenantId;

/// An opened protocol session
pub struct ProtocolConnection {
    /// Handle for outbound calls on this socket
    pub handle: Arc<dyn ProtocolHandle>,
    /// Events in the order the socket emitted them
    pub events: mpsc::Receiver<ProtocolEvent>,
}

impl std::fmt::Debug for ProtocolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolConnection")
            .field("open", &self.handle.is_open())
            .finish()
    }
}

/// Opens protocol sessions
#[async_trait]
pub trait ProtocolConnector: Send + Sync {
    /// Open a socket for a tenant using the given credentials
    async fn open(
        &self,
        tenant_id: &TenantId,
        credentials: Credentials,
    ) -> RepoResult<ProtocolConnection>;
}

/// Outbound side of one open protocol socket
#[async_trait]
pub trait ProtocolHandle: Send + Sync {
    /// Send content to an address, returning the protocol delivery ID
    async fn send(&self, address: &str, content: &OutboundContent) -> RepoResult<String>;

    /// Look up the external address behind an opaque identifier
    async fn resolve_identifier(&self, opaque_id: &str) -> RepoResult<Option<String>>;

    /// Whether the underlying socket is actually open right now
    fn is_open(&self) -> bool;

    /// Log the account out on the protocol side (invalidates credentials)
    async fn logout(&self) -> RepoResult<()>;

    /// Force-close the socket
    async fn terminate(&self);
}
