//! PostgreSQL implementation of RecordSource

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use relay_core::{RecordSource, RepoResult, SessionRecord};

use crate::mappers::SessionRecordInsert;
use crate::models::SessionRecordModel;

use super::error::map_db_error;

/// Remote registry tier
#[derive(Clone)]
pub struct PgRecordRepository {
    pool: PgPool,
}

impl PgRecordRepository {
    /// Create a new PgRecordRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSource for PgRecordRepository {
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self))]
    async fn load_all(&self) -> RepoResult<Vec<SessionRecord>> {
        let rows = sqlx::query_as::<_, SessionRecordModel>(
            r#"
            SELECT tenant_id, webhook_url, status, created_at, last_connected_at
            FROM session_records
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match SessionRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable session record"),
            }
        }
        Ok(records)
    }

    /// Rewrite the table so it holds exactly `records`
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn store_all(&self, records: &[SessionRecord]) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let keep: Vec<String> = records
            .iter()
            .map(|r| r.tenant_id.as_str().to_string())
            .collect();

        sqlx::query("DELETE FROM session_records WHERE NOT (tenant_id = ANY($1))")
            .bind(&keep)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        for record in records {
            let insert = SessionRecordInsert::new(record);
            sqlx::query(
                r#"
                INSERT INTO session_records
                    (tenant_id, webhook_url, status, created_at, last_connected_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (tenant_id) DO UPDATE SET
                    webhook_url = EXCLUDED.webhook_url,
                    status = EXCLUDED.status,
                    last_connected_at = EXCLUDED.last_connected_at
                "#,
            )
            .bind(insert.tenant_id)
            .bind(insert.webhook_url)
            .bind(insert.status)
            .bind(insert.created_at)
            .bind(insert.last_connected_at)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
        }

        tx.commit().await.map_err(map_db_error)?;
        Ok(())
    }
}
