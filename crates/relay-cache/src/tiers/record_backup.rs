//! Registry backup in Redis.
//!
//! The whole record set lives under a single key and is replaced wholesale.

use async_trait::async_trait;
use relay_core::{RecordSource, RepoResult, SessionRecord};

use crate::pool::RedisPool;

/// Key holding the JSON array of session records
const RECORDS_KEY: &str = "registry:records";

/// Redis-backed record tier
#[derive(Debug, Clone)]
pub struct RedisRecordBackup {
    pool: RedisPool,
    key: String,
}

impl RedisRecordBackup {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            key: RECORDS_KEY.to_string(),
        }
    }

    /// Use a different key, mainly so tests do not clobber each other
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

#[async_trait]
impl RecordSource for RedisRecordBackup {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn load_all(&self) -> RepoResult<Vec<SessionRecord>> {
        let records: Option<Vec<SessionRecord>> = self.pool.get_value(&self.key).await?;
        Ok(records.unwrap_or_default())
    }

    async fn store_all(&self, records: &[SessionRecord]) -> RepoResult<()> {
        self.pool.set(&self.key, &records, None).await?;
        tracing::debug!(count = records.len(), "Registry backed up to redis");
        Ok(())
    }
}
