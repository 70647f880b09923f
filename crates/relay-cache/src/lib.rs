//! # relay-cache
//!
//! Redis-backed disaster-recovery tiers for the gateway.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Credential Mirror**: Compact per-tenant credential copies with a TTL
//! - **Registry Backup**: The full session record set, rewritten wholesale
//!
//! ## Example
//!
//! ```ignore
//! use relay_cache::{RedisCredentialSource, RedisPool, RedisPoolConfig};
//!
//! let pool = RedisPool::new(RedisPoolConfig::default())?;
//! let mirror = RedisCredentialSource::new(pool.clone());
//! mirror.save(&tenant_id, &credentials).await?;
//! ```

pub mod pool;
pub mod tiers;

// Re-export pool types
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

// Re-export tier types
pub use tiers::{RedisCredentialSource, RedisRecordBackup};
