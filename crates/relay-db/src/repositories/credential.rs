//! PostgreSQL implementation of CredentialSource

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use relay_core::{CredentialSource, Credentials, DomainError, RepoResult, TenantId};

use crate::models::CredentialModel;

use super::error::map_db_error;

/// Remote credential tier, one jsonb row per tenant
#[derive(Clone)]
pub struct PgCredentialSource {
    pool: PgPool,
}

impl PgCredentialSource {
    /// Create a new PgCredentialSource
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialSource for PgCredentialSource {
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self))]
    async fn load(&self, tenant_id: &TenantId) -> RepoResult<Option<Credentials>> {
        let row = sqlx::query_as::<_, CredentialModel>(
            r#"
            SELECT tenant_id, blob, updated_at
            FROM session_credentials
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let credentials = Credentials::try_from(row)?;
        if credentials.is_empty() {
            return Ok(None);
        }
        Ok(Some(credentials))
    }

    #[instrument(skip(self, credentials))]
    async fn save(&self, tenant_id: &TenantId, credentials: &Credentials) -> RepoResult<()> {
        let blob = serde_json::to_value(credentials)
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO session_credentials (tenant_id, blob, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (tenant_id)
            DO UPDATE SET blob = EXCLUDED.blob, updated_at = NOW()
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(blob)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear(&self, tenant_id: &TenantId) -> RepoResult<()> {
        sqlx::query("DELETE FROM session_credentials WHERE tenant_id = $1")
            .bind(tenant_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }
}
