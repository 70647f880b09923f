//! Persistence ports - credential tiers, record tiers, and media storage
//!
//! Each tier is one implementation of the same trait. The gateway composes them into
//! ordered fallback chains; no tier knows about the others.

use async_trait::async_trait;

use crate::entities::{Credentials, SessionRecord};
use crate::error::DomainError;
use crate::value_objects::TenantId;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Credential Source
// ============================================================================

#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Tier name for logs
    fn name(&self) -> &'static str;

    /// Load credentials, `None` when this tier has nothing for the tenant
    async fn load(&self, tenant_id: &TenantId) -> RepoResult<Option<Credentials>>;

    /// Store credentials, replacing whatever the tier held
    async fn save(&self, tenant_id: &TenantId, credentials: &Credentials) -> RepoResult<()>;

    /// Remove credentials; removing something absent is not an error
    async fn clear(&self, tenant_id: &TenantId) -> RepoResult<()>;
}

// ============================================================================
// Record Source
// ============================================================================

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Tier name for logs
    fn name(&self) -> &'static str;

    /// Load every persisted session record
    async fn load_all(&self) -> RepoResult<Vec<SessionRecord>>;

    /// Replace the full persisted set with `records`
    async fn store_all(&self, records: &[SessionRecord]) -> RepoResult<()>;
}

// ============================================================================
// Object Store
// ============================================================================

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store media bytes, returning a public URL or `None` when storage is unconfigured
    async fn put(
        &self,
        bytes: &[u8],
        mime_type: &str,
        tenant_id: &TenantId,
    ) -> RepoResult<Option<String>>;
}

/// Object store used when no media backend is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObjectStore;

#[async_trait]
impl ObjectStore for NoopObjectStore {
    async fn put(
        &self,
        _bytes: &[u8],
        _mime_type: &str,
        _tenant_id: &TenantId,
    ) -> RepoResult<Option<String>> {
        Ok(None)
    }
}
