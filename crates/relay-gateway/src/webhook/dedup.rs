//! Dedup window for inbound message deliveries

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use relay_core::TenantId;
use std::time::Duration;
use tokio::time::Instant;

/// Recently delivered `(tenant, message)` keys with their insertion time
#[derive(Debug)]
pub struct DedupCache {
    entries: DashMap<String, Instant>,
    ttl: Duration,
}

impl DedupCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Composite key of tenant and protocol message ID
    #[must_use]
    pub fn key(tenant_id: &TenantId, message_id: &str) -> String {
        format!("{tenant_id}:{message_id}")
    }

    /// Record `key` and report whether it was unseen within the window
    ///
    /// Check and insert happen under one shard lock, so concurrent callers with the
    /// same key see exactly one `true`.
    pub fn check_and_insert(&self, key: String) -> bool {
        let now = Instant::now();
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.ttl {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Drop every entry older than the TTL, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, inserted| now.duration_since(*inserted) < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
