//! Connector used when the binary runs without a protocol backend

use async_trait::async_trait;
use relay_core::{
    Credentials, DomainError, ProtocolConnection, ProtocolConnector, RepoResult, TenantId,
};

/// Refuses every open; sessions back off and settle in `disconnected`
///
/// The binary runs with this connector until a protocol backend implementing
/// [`ProtocolConnector`] is linked in its place.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlinkedConnector;

#[async_trait]
impl ProtocolConnector for UnlinkedConnector {
    async fn open(
        &self,
        tenant_id: &TenantId,
        _credentials: Credentials,
    ) -> RepoResult<ProtocolConnection> {
        tracing::debug!(tenant_id = %tenant_id, "No protocol backend linked");
        Err(DomainError::ProtocolError(
            "no protocol backend is linked into this build".to_string(),
        ))
    }
}
