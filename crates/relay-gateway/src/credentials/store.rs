//! Credential store - the ordered fallback chain over credential tiers

use dashmap::DashMap;
use relay_core::{CredentialSource, Credentials, TenantId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ordering state of one tenant's mirror writes
#[derive(Default)]
struct MirrorSlot {
    /// Bumped by every save and clear; a queued write lands only while it matches
    generation: AtomicU64,
    /// Held by the mirror write in flight and by `clear`
    write_lock: tokio::sync::Mutex<()>,
}

/// Per-tenant credential persistence across every configured tier
#[derive(Clone)]
pub struct CredentialStore {
    /// Tier the protocol layer reads and writes during normal operation
    local: Arc<dyn CredentialSource>,
    /// Higher-priority tiers, most authoritative first
    mirrors: Vec<Arc<dyn CredentialSource>>,
    slots: Arc<DashMap<TenantId, Arc<MirrorSlot>>>,
}

impl CredentialStore {
    /// Create a store backed only by the local tier
    #[must_use]
    pub fn new(local: Arc<dyn CredentialSource>) -> Self {
        Self {
            local,
            mirrors: Vec::new(),
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Append a mirror tier; earlier mirrors take priority on reads
    #[must_use]
    pub fn with_mirror(mut self, tier: Arc<dyn CredentialSource>) -> Self {
        self.mirrors.push(tier);
        self
    }

    /// Tier names in read order
    pub fn tier_names(&self) -> Vec<&'static str> {
        self.read_order().map(|t| t.name()).collect()
    }

    fn read_order(&self) -> impl Iterator<Item = &Arc<dyn CredentialSource>> {
        self.mirrors.iter().chain(std::iter::once(&self.local))
    }

    fn slot(&self, tenant_id: &TenantId) -> Arc<MirrorSlot> {
        Arc::clone(self.slots.entry(tenant_id.clone()).or_default().value())
    }

    /// Load credentials from the first tier holding a non-empty blob
    ///
    /// A failing tier counts as empty. When every tier is empty, fresh initial
    /// credentials are synthesized.
    pub async fn load(&self, tenant_id: &TenantId) -> Credentials {
        for tier in self.read_order() {
            match tier.load(tenant_id).await {
                Ok(Some(credentials)) if !credentials.is_empty() => {
                    tracing::debug!(tenant_id = %tenant_id, tier = tier.name(), "Credentials loaded");
                    return credentials;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        tier = tier.name(),
                        error = %e,
                        "Credential tier unavailable, falling through"
                    );
                }
            }
        }

        tracing::info!(tenant_id = %tenant_id, "No stored credentials, starting fresh");
        Credentials::fresh()
    }

    /// Persist credentials to local disk, then mirror them without waiting
    ///
    /// Mirror writes of one tenant run one at a time. A write superseded by a
    /// newer save or by `clear` before it reaches a tier is dropped.
    pub async fn save(
        &self,
        tenant_id: &TenantId,
        credentials: &Credentials,
    ) -> relay_core::RepoResult<()> {
        self.local.save(tenant_id, credentials).await?;

        if self.mirrors.is_empty() {
            return Ok(());
        }

        let slot = self.slot(tenant_id);
        let generation = slot.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mirrors = self.mirrors.clone();
        let tenant_id = tenant_id.clone();
        let credentials = credentials.clone();
        tokio::spawn(async move {
            let _write = slot.write_lock.lock().await;
            for tier in mirrors {
                if slot.generation.load(Ordering::SeqCst) != generation {
                    tracing::debug!(tenant_id = %tenant_id, "Credential mirror superseded");
                    return;
                }
                if let Err(e) = tier.save(&tenant_id, &credentials).await {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        tier = tier.name(),
                        error = %e,
                        "Credential mirror failed"
                    );
                }
            }
        });

        Ok(())
    }

    /// Remove credentials from every tier; failures are logged, never returned
    ///
    /// Pending mirror writes are cancelled and one in flight is awaited first,
    /// so nothing written before the clear can land after it.
    pub async fn clear(&self, tenant_id: &TenantId) {
        let slot = self.slot(tenant_id);
        slot.generation.fetch_add(1, Ordering::SeqCst);
        let _write = slot.write_lock.lock().await;

        for tier in self.read_order() {
            if let Err(e) = tier.clear(tenant_id).await {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    tier = tier.name(),
                    error = %e,
                    "Failed to clear credential tier"
                );
            }
        }
        tracing::info!(tenant_id = %tenant_id, "Credentials cleared");
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("tiers", &self.tier_names())
            .finish()
    }
}
