//! In-memory credential and record tiers

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{
    CredentialSource, Credentials, DomainError, RecordSource, RepoResult, SessionRecord, TenantId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

fn unavailable(name: &str) -> DomainError {
    DomainError::StorageError(format!("{name} tier unavailable"))
}

/// Credential tier held in a map, with switches to make it fail or slow
pub struct MemoryCredentialSource {
    name: &'static str,
    entries: Mutex<HashMap<TenantId, Credentials>>,
    failing: AtomicBool,
    latency: Mutex<Duration>,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryCredentialSource {
    #[must_use]
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            loads: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, tenant_id: &TenantId, credentials: Credentials) {
        self.entries.lock().insert(tenant_id.clone(), credentials);
    }

    /// Direct read that bypasses the failure switch and the load counter
    pub fn get(&self, tenant_id: &TenantId) -> Option<Credentials> {
        self.entries.lock().get(tenant_id).cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay applied to every save before it lands
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check(&self) -> RepoResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(unavailable(self.name))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryCredentialSource {
    fn default() -> Self {
        Self::named("memory")
    }
}

#[async_trait]
impl CredentialSource for MemoryCredentialSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn load(&self, tenant_id: &TenantId) -> RepoResult<Option<Credentials>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.get(tenant_id))
    }

    async fn save(&self, tenant_id: &TenantId, credentials: &Credentials) -> RepoResult<()> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.check()?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.insert(tenant_id, credentials.clone());
        Ok(())
    }

    async fn clear(&self, tenant_id: &TenantId) -> RepoResult<()> {
        self.check()?;
        self.entries.lock().remove(tenant_id);
        Ok(())
    }
}

/// Record tier held in a vector, with a switch to make it fail
pub struct MemoryRecordSource {
    name: &'static str,
    records: Mutex<Vec<SessionRecord>>,
    failing: AtomicBool,
    loads: AtomicUsize,
    stores: AtomicUsize,
}

impl MemoryRecordSource {
    #[must_use]
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            records: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            stores: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, records: Vec<SessionRecord>) {
        *self.records.lock() = records;
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }
}

impl Default for MemoryRecordSource {
    fn default() -> Self {
        Self::named("memory")
    }
}

#[async_trait]
impl RecordSource for MemoryRecordSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn load_all(&self) -> RepoResult<Vec<SessionRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable(self.name));
        }
        Ok(self.records())
    }

    async fn store_all(&self, records: &[SessionRecord]) -> RepoResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable(self.name));
        }
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.set(records.to_vec());
        Ok(())
    }
}
