//! Credential mirror in Redis.
//!
//! Holds the compact JSON copy of each tenant's credentials so a fresh node can
//! resume a paired session without touching the local disk.

use async_trait::async_trait;
use relay_core::{CredentialSource, Credentials, DomainError, RepoResult, TenantId};

use crate::pool::RedisPool;

/// Key prefix for credential blobs
const CREDENTIALS_PREFIX: &str = "creds:";

/// Default TTL for mirrored credentials (30 days)
pub const DEFAULT_CREDENTIAL_TTL: u64 = 30 * 24 * 60 * 60;

/// Redis-backed credential tier
#[derive(Debug, Clone)]
pub struct RedisCredentialSource {
    pool: RedisPool,
    ttl_seconds: u64,
}

impl RedisCredentialSource {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            ttl_seconds: DEFAULT_CREDENTIAL_TTL,
        }
    }

    /// Override the mirror TTL
    #[must_use]
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    fn key(tenant_id: &TenantId) -> String {
        format!("{CREDENTIALS_PREFIX}{tenant_id}")
    }
}

#[async_trait]
impl CredentialSource for RedisCredentialSource {
    fn name(&self) -> &'static str {
        "redis"
    }

    #[tracing::instrument(skip(self), fields(tier = "redis"))]
    async fn load(&self, tenant_id: &TenantId) -> RepoResult<Option<Credentials>> {
        let raw = self.pool.get_raw(&Self::key(tenant_id)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let credentials: Credentials = serde_json::from_str(&raw)
            .map_err(|e| DomainError::CacheError(format!("corrupt credential blob: {e}")))?;

        if credentials.is_empty() {
            return Ok(None);
        }
        Ok(Some(credentials))
    }

    #[tracing::instrument(skip(self, credentials), fields(tier = "redis"))]
    async fn save(&self, tenant_id: &TenantId, credentials: &Credentials) -> RepoResult<()> {
        let blob = credentials
            .to_compact_json()
            .map_err(|e| DomainError::CacheError(e.to_string()))?;
        self.pool
            .set_raw(&Self::key(tenant_id), &blob, Some(self.ttl_seconds))
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(tier = "redis"))]
    async fn clear(&self, tenant_id: &TenantId) -> RepoResult<()> {
        self.pool.delete(&Self::key(tenant_id)).await?;
        Ok(())
    }
}
