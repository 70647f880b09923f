//! PostgreSQL implementations of the persistence ports

mod credential;
mod error;
mod session_record;

pub use credential::PgCredentialSource;
pub use error::map_db_error;
pub use session_record::PgRecordRepository;

/// Connection for tests that need a live database, skipped when `DATABASE_URL` is unset
#[cfg(test)]
pub(crate) async fn test_pool() -> Option<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = sqlx::PgPool::connect(&url).await.ok()?;
    crate::pool::ensure_schema(&pool).await.ok()?;
    Some(pool)
}
