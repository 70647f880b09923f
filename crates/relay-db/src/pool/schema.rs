//! Table bootstrap for the remote tier

use sqlx::PgPool;

const CREATE_CREDENTIALS: &str = r#"
CREATE TABLE IF NOT EXISTS session_credentials (
    tenant_id   TEXT PRIMARY KEY,
    blob        JSONB NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_RECORDS: &str = r#"
CREATE TABLE IF NOT EXISTS session_records (
    tenant_id          TEXT PRIMARY KEY,
    webhook_url        TEXT NOT NULL,
    status             TEXT NOT NULL,
    created_at         TIMESTAMPTZ NOT NULL,
    last_connected_at  TIMESTAMPTZ
)
"#;

/// Create the gateway tables when they are missing
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_CREDENTIALS).execute(pool).await?;
    sqlx::query(CREATE_RECORDS).execute(pool).await?;
    tracing::debug!("Database schema ensured");
    Ok(())
}
