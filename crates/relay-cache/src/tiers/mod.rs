//! Persistence tiers backed by Redis.

mod credential_cache;
mod record_backup;

pub use credential_cache::{RedisCredentialSource, DEFAULT_CREDENTIAL_TTL};
pub use record_backup::RedisRecordBackup;

use crate::pool::RedisPoolError;
use relay_core::DomainError;

impl From<RedisPoolError> for DomainError {
    fn from(err: RedisPoolError) -> Self {
        DomainError::CacheError(err.to_string())
    }
}
