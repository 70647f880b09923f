//! # relay-db
//!
//! Remote persistence tiers backed by PostgreSQL via SQLx.
//!
//! ## Overview
//!
//! Two tables back the gateway's most durable tier:
//!
//! - `session_credentials`: one jsonb credential blob per tenant
//! - `session_records`: the registry of tenant sessions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_db::pool::{create_pool, ensure_schema, PgPoolConfig};
//! use relay_db::repositories::PgCredentialSource;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&PgPoolConfig::default()).await?;
//!     ensure_schema(&pool).await?;
//!     let credentials = PgCredentialSource::new(pool);
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, ensure_schema, PgPool, PgPoolConfig};
pub use repositories::{PgCredentialSource, PgRecordRepository};
