//! Instance registry
//!
//! Owns every [`Session`] keyed by tenant, and is the only writer of the
//! persisted session records. Sessions report status transitions over a channel;
//! a background task folds them into the records and rewrites the record tiers.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use relay_core::{DomainError, OutboundContent, RepoResult, SessionRecord, SessionStatus, TenantId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

use super::normalize::normalize_webhook_url;
use super::records::{RecordOrigin, RecordStore};
use crate::session::{
    IdentifierMapping, PairingArtifact, Session, SessionDeps, SessionPolicy, SessionSnapshot,
    StatusUpdate,
};

/// Number of sessions in each status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub disconnected: usize,
    pub connecting: usize,
    pub requires_pairing: usize,
    pub connected: usize,
}

impl StatusCounts {
    fn add(&mut self, status: SessionStatus) {
        self.total += 1;
        match status {
            SessionStatus::Disconnected => self.disconnected += 1,
            SessionStatus::Connecting => self.connecting += 1,
            SessionStatus::RequiresPairing => self.requires_pairing += 1,
            SessionStatus::Connected => self.connected += 1,
        }
    }
}

/// Registry of tenant sessions
pub struct InstanceRegistry {
    sessions: DashMap<TenantId, Arc<Session>>,
    records: Mutex<BTreeMap<TenantId, SessionRecord>>,
    record_store: RecordStore,
    /// Serializes wholesale rewrites so a stale snapshot never lands last
    persist_lock: tokio::sync::Mutex<()>,
    deps: SessionDeps,
    policy: SessionPolicy,
    webhook_base: Option<String>,
    updates: mpsc::UnboundedSender<StatusUpdate>,
}

impl InstanceRegistry {
    /// Create an empty registry and start its status persister
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        deps: SessionDeps,
        record_store: RecordStore,
        policy: SessionPolicy,
        webhook_base: Option<String>,
    ) -> Arc<Self> {
        let (updates, rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            sessions: DashMap::new(),
            records: Mutex::new(BTreeMap::new()),
            record_store,
            persist_lock: tokio::sync::Mutex::new(()),
            deps,
            policy,
            webhook_base: webhook_base.filter(|b| !b.trim().is_empty()),
            updates,
        });

        tokio::spawn(Self::run_persister(Arc::downgrade(&registry), rx));
        registry
    }

    async fn run_persister(registry: Weak<Self>, mut rx: mpsc::UnboundedReceiver<StatusUpdate>) {
        while let Some(update) = rx.recv().await {
            let Some(registry) = registry.upgrade() else {
                break;
            };

            let mut changed = registry.apply_update(&update);
            while let Ok(update) = rx.try_recv() {
                changed |= registry.apply_update(&update);
            }

            if changed {
                if let Err(e) = registry.persist().await {
                    tracing::error!(error = %e, "Failed to persist session status");
                }
            }
        }
        tracing::debug!("Status persister stopped");
    }

    fn apply_update(&self, update: &StatusUpdate) -> bool {
        match self.records.lock().get_mut(&update.tenant_id) {
            Some(record) => {
                record.apply_status(update.status, update.at);
                true
            }
            None => false,
        }
    }

    async fn persist(&self) -> RepoResult<()> {
        let _guard = self.persist_lock.lock().await;
        let records: Vec<SessionRecord> = self.records.lock().values().cloned().collect();
        self.record_store.store_all(&records).await
    }

    fn new_session(&self, tenant_id: TenantId, webhook_url: String) -> Arc<Session> {
        Session::new(
            tenant_id,
            webhook_url,
            self.policy,
            self.deps.clone(),
            Some(self.updates.clone()),
        )
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Register a tenant and start connecting
    ///
    /// The record is persisted before the socket is opened; if that write fails
    /// the registration is rolled back.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        webhook_url: impl Into<String>,
    ) -> Result<Arc<Session>, DomainError> {
        let webhook_url = webhook_url.into();
        let session = match self.sessions.entry(tenant_id.clone()) {
            Entry::Occupied(_) => return Err(DomainError::TenantAlreadyExists(tenant_id)),
            Entry::Vacant(entry) => {
                let session = self.new_session(tenant_id.clone(), webhook_url.clone());
                entry.insert(Arc::clone(&session));
                session
            }
        };

        self.records.lock().insert(
            tenant_id.clone(),
            SessionRecord::new(tenant_id.clone(), webhook_url),
        );

        if let Err(e) = self.persist().await {
            tracing::error!(tenant_id = %tenant_id, error = %e, "Failed to persist new session");
            self.sessions.remove(&tenant_id);
            self.records.lock().remove(&tenant_id);
            return Err(e);
        }

        tracing::info!(tenant_id = %tenant_id, "Session created");
        session.connect().await;
        Ok(session)
    }

    pub fn get(&self, tenant_id: &TenantId) -> Option<Arc<Session>> {
        self.sessions.get(tenant_id).map(|s| Arc::clone(s.value()))
    }

    fn session(&self, tenant_id: &TenantId) -> Result<Arc<Session>, DomainError> {
        self.get(tenant_id)
            .ok_or_else(|| DomainError::TenantNotFound(tenant_id.clone()))
    }

    /// Tear a tenant down for good
    ///
    /// Destroys the session (flags, logout, socket), wipes credentials on every
    /// tier, then drops the record. Returns `false` for unknown tenants.
    pub async fn delete(&self, tenant_id: &TenantId) -> bool {
        let Some(session) = self.get(tenant_id) else {
            return false;
        };

        session.destroy().await;
        self.deps.credentials.clear(tenant_id).await;

        self.sessions.remove(tenant_id);
        self.records.lock().remove(tenant_id);
        if let Err(e) = self.persist().await {
            tracing::error!(tenant_id = %tenant_id, error = %e, "Failed to persist session removal");
        }

        tracing::info!(tenant_id = %tenant_id, "Session deleted");
        true
    }

    /// Reopen a tenant's socket, optionally switching its webhook
    pub async fn restart(
        &self,
        tenant_id: &TenantId,
        webhook_url: Option<&str>,
    ) -> Option<Arc<Session>> {
        let session = self.get(tenant_id)?;

        if let Some(url) = webhook_url {
            session.set_webhook_url(url);
            if let Some(record) = self.records.lock().get_mut(tenant_id) {
                record.webhook_url = url.to_string();
            }
            if let Err(e) = self.persist().await {
                tracing::error!(tenant_id = %tenant_id, error = %e, "Failed to persist webhook change");
            }
        }

        tracing::info!(tenant_id = %tenant_id, "Restarting session");
        session.reopen().await;
        Some(session)
    }

    /// Restore persisted sessions and start connecting them
    ///
    /// Records come from the first non-empty tier. Webhook URLs are normalized
    /// against the configured base; the local file is rewritten when anything
    /// was corrected or the records came from a mirror. Returns how many
    /// sessions were restored.
    pub async fn bootstrap(&self) -> usize {
        let (records, origin) = self.record_store.load_first_non_empty().await;
        let mut changed = matches!(origin, RecordOrigin::Remote | RecordOrigin::Cache);

        let mut restored = Vec::with_capacity(records.len());
        for mut record in records {
            if let Some(base) = &self.webhook_base {
                let normalized = normalize_webhook_url(base, &record.tenant_id);
                if normalized != record.webhook_url {
                    tracing::info!(
                        tenant_id = %record.tenant_id,
                        from = %record.webhook_url,
                        to = %normalized,
                        "Normalizing webhook URL"
                    );
                    record.webhook_url = normalized;
                    changed = true;
                }
            }

            let Entry::Vacant(entry) = self.sessions.entry(record.tenant_id.clone()) else {
                continue;
            };
            let session = self.new_session(record.tenant_id.clone(), record.webhook_url.clone());
            entry.insert(Arc::clone(&session));
            self.records.lock().insert(record.tenant_id.clone(), record);
            restored.push(session);
        }

        if changed {
            if let Err(e) = self.persist().await {
                tracing::error!(error = %e, "Failed to persist restored session records");
            }
        }

        join_all(restored.iter().map(|s| s.connect())).await;
        tracing::info!(count = restored.len(), origin = ?origin, "Sessions restored");
        restored.len()
    }

    /// Close every session, keeping records and credentials for the next boot
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        join_all(sessions.iter().map(|s| s.close())).await;
        self.sessions.clear();
        self.deps.dispatcher.stop();

        tracing::info!(count = sessions.len(), "Registry shut down");
    }

    // =========================================================================
    // Per-tenant operations
    // =========================================================================

    pub fn get_status(&self, tenant_id: &TenantId) -> Result<SessionSnapshot, DomainError> {
        Ok(self.session(tenant_id)?.snapshot())
    }

    pub fn get_pairing_artifact(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<PairingArtifact>, DomainError> {
        Ok(self.session(tenant_id)?.pairing_artifact())
    }

    pub async fn send(
        &self,
        tenant_id: &TenantId,
        address: &str,
        content: OutboundContent,
    ) -> Result<String, DomainError> {
        self.session(tenant_id)?.send(address, content).await
    }

    pub async fn send_text(
        &self,
        tenant_id: &TenantId,
        address: &str,
        text: impl Into<String>,
    ) -> Result<String, DomainError> {
        self.session(tenant_id)?.send_text(address, text).await
    }

    pub async fn send_media(
        &self,
        tenant_id: &TenantId,
        address: &str,
        mime_type: impl Into<String>,
        data: Vec<u8>,
        caption: Option<String>,
    ) -> Result<String, DomainError> {
        self.session(tenant_id)?
            .send_media(address, mime_type, data, caption)
            .await
    }

    pub fn list_identifier_mappings(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<IdentifierMapping>, DomainError> {
        Ok(self.session(tenant_id)?.identifier_mappings())
    }

    /// Returns whether the mapping was new or changed
    pub fn add_identifier_mapping(
        &self,
        tenant_id: &TenantId,
        opaque_id: &str,
        address: &str,
    ) -> Result<bool, DomainError> {
        let session = self.session(tenant_id)?;
        if opaque_id.trim().is_empty() || address.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "opaque id and address are required".to_string(),
            ));
        }
        Ok(session.add_identifier_mapping(opaque_id.trim(), address.trim()))
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Snapshots of every session, ordered by tenant
    pub fn list(&self) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<_> = self.sessions.iter().map(|s| s.snapshot()).collect();
        snapshots.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        snapshots
    }

    /// Persisted view of every session, ordered by tenant
    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.lock().values().cloned().collect()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for session in &self.sessions {
            counts.add(session.status());
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("sessions", &self.sessions.len())
            .field("record_store", &self.record_store)
            .field("webhook_base", &self.webhook_base)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use crate::session::ReconnectPolicy;
    use crate::testing::{
        settle, FakeConnector, MemoryCredentialSource, MemoryRecordSource, RecordingTransport,
    };
    use crate::webhook::{WebhookDispatcher, WebhookPolicy};
    use relay_core::{Credentials, InboundMessage};
    use std::time::Duration;

    struct Harness {
        registry: Arc<InstanceRegistry>,
        connector: Arc<FakeConnector>,
        transport: Arc<RecordingTransport>,
        disk: Arc<MemoryCredentialSource>,
        local: Arc<MemoryRecordSource>,
        cache: Arc<MemoryRecordSource>,
        remote: Arc<MemoryRecordSource>,
    }

    fn policy() -> SessionPolicy {
        SessionPolicy {
            reconnect: ReconnectPolicy {
                base: Duration::from_secs(2),
                cap: Duration::from_secs(60),
                max_attempts: 10,
            },
            grace_period: Duration::from_secs(3),
            watchdog_interval: Duration::from_secs(30),
            rate_limit_per_minute: 30,
        }
    }

    fn harness(webhook_base: Option<&str>) -> Harness {
        let connector = Arc::new(FakeConnector::new());
        let transport = Arc::new(RecordingTransport::new());
        let disk = Arc::new(MemoryCredentialSource::named("disk"));
        let local = Arc::new(MemoryRecordSource::named("local"));
        let cache = Arc::new(MemoryRecordSource::named("cache"));
        let remote = Arc::new(MemoryRecordSource::named("remote"));

        let deps = SessionDeps::new(
            connector.clone(),
            Arc::new(CredentialStore::new(disk.clone())),
            Arc::new(WebhookDispatcher::new(transport.clone(), WebhookPolicy::default())),
        );
        let store = RecordStore::new(local.clone())
            .with_remote(remote.clone())
            .with_cache(cache.clone());
        let registry = InstanceRegistry::new(deps, store, policy(), webhook_base.map(String::from));

        Harness {
            registry,
            connector,
            transport,
            disk,
            local,
            cache,
            remote,
        }
    }

    fn tenant(id: &str) -> TenantId {
        TenantId::parse(id).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_persists_then_connects() {
        let h = harness(None);
        let session = h.registry.create(tenant("T1"), "https://x/hook").await.unwrap();

        assert_eq!(session.status(), SessionStatus::Connecting);
        assert_eq!(h.connector.open_count(&tenant("T1")), 1);
        let stored = h.local.records();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].webhook_url, "https://x/hook");
        // Mirrors receive the same rewrite
        assert_eq!(h.remote.records().len(), 1);
        assert_eq!(h.cache.records().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_rejects_duplicates() {
        let h = harness(None);
        h.registry.create(tenant("T1"), "https://x/hook").await.unwrap();

        let err = h.registry.create(tenant("T1"), "https://y/hook").await.unwrap_err();
        assert!(matches!(err, DomainError::TenantAlreadyExists(_)));
        assert_eq!(h.connector.open_count(&tenant("T1")), 1);
        assert_eq!(h.registry.get(&tenant("T1")).unwrap().webhook_url(), "https://x/hook");
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_rolls_back_when_persist_fails() {
        let h = harness(None);
        h.local.set_failing(true);

        let err = h.registry.create(tenant("T1"), "https://x/hook").await.unwrap_err();
        assert!(matches!(err, DomainError::StorageError(_)));
        assert!(h.registry.get(&tenant("T1")).is_none());
        assert_eq!(h.connector.total_opens(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_transitions_are_persisted() {
        let h = harness(None);
        h.registry.create(tenant("T1"), "https://x/hook").await.unwrap();
        h.connector.socket(&tenant("T1")).unwrap().open().await;
        settle().await;

        let stored = h.local.records();
        assert_eq!(stored[0].status, SessionStatus::Connected);
        assert!(stored[0].last_connected_at.is_some());
        assert_eq!(h.registry.records()[0].status, SessionStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_tears_down_everything() {
        let h = harness(None);
        h.disk.insert(&tenant("T1"), Credentials::new(serde_json::json!({"registered": true})));
        h.registry.create(tenant("T1"), "https://x/hook").await.unwrap();
        let socket = h.connector.socket(&tenant("T1")).unwrap();
        socket.open().await;
        settle().await;

        assert!(h.registry.delete(&tenant("T1")).await);
        assert_eq!(socket.handle().logouts(), 1);
        assert!(h.disk.get(&tenant("T1")).is_none());
        assert!(h.registry.get(&tenant("T1")).is_none());
        assert!(h.local.records().is_empty());

        assert!(!h.registry.delete(&tenant("T1")).await);
        assert!(!h.registry.delete(&tenant("nobody")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_is_final_for_pending_timers_and_callbacks() {
        let h = harness(None);
        h.registry.create(tenant("T1"), "https://x/hook").await.unwrap();
        let socket = h.connector.socket(&tenant("T1")).unwrap();
        socket.close(428).await;
        settle().await;
        let delivered = h.transport.delivered().len();

        assert!(h.registry.delete(&tenant("T1")).await);
        socket.message(InboundMessage::text("late", "555", "x")).await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;

        assert_eq!(h.connector.open_count(&tenant("T1")), 1);
        assert_eq!(h.transport.delivered().len(), delivered);
        assert!(h.local.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_switches_webhook_and_keeps_credentials() {
        let h = harness(None);
        let creds = Credentials::new(serde_json::json!({"registered": true}));
        h.disk.insert(&tenant("T1"), creds.clone());
        h.registry.create(tenant("T1"), "https://x/hook").await.unwrap();

        let session = h
            .registry
            .restart(&tenant("T1"), Some("https://y/hook"))
            .await
            .unwrap();

        assert_eq!(session.webhook_url(), "https://y/hook");
        assert_eq!(h.local.records()[0].webhook_url, "https://y/hook");
        assert_eq!(h.connector.open_count(&tenant("T1")), 2);
        assert_eq!(h.connector.socket(&tenant("T1")).unwrap().credentials, creds);
        assert!(h.registry.restart(&tenant("T9"), None).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_prefers_cache_when_remote_empty_and_normalizes() {
        let h = harness(Some("https://hooks.example.com/in/"));
        h.cache.set(vec![
            SessionRecord::new(tenant("A"), "https://old/A"),
            SessionRecord::new(tenant("B"), "https://hooks.example.com/in/B"),
        ]);
        h.local.set(vec![SessionRecord::new(tenant("L"), "https://l")]);

        let restored = h.registry.bootstrap().await;
        assert_eq!(restored, 2);
        assert!(h.registry.get(&tenant("L")).is_none());

        let a = h.registry.get(&tenant("A")).unwrap();
        assert_eq!(a.webhook_url(), "https://hooks.example.com/in/A");
        assert_eq!(a.status(), SessionStatus::Connecting);
        assert_eq!(h.connector.total_opens(), 2);

        // The local file now reflects the recovered, corrected set
        let local: Vec<_> = h.local.records();
        assert_eq!(local.len(), 2);
        assert!(local.iter().all(|r| r.webhook_url.starts_with("https://hooks.example.com/in/")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_falls_back_to_local_file() {
        let h = harness(None);
        h.local.set(vec![SessionRecord::new(tenant("L"), "https://l")]);

        assert_eq!(h.registry.bootstrap().await, 1);
        assert_eq!(h.remote.loads(), 1);
        assert_eq!(h.cache.loads(), 1);
        // Without a configured base the stored URL is kept as is
        assert_eq!(h.registry.get(&tenant("L")).unwrap().webhook_url(), "https://l");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_with_nothing_persisted() {
        let h = harness(None);
        assert_eq!(h.registry.bootstrap().await, 0);
        assert!(h.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_keeps_records_and_credentials() {
        let h = harness(None);
        h.disk.insert(&tenant("T1"), Credentials::new(serde_json::json!({"registered": true})));
        h.registry.create(tenant("T1"), "https://x/hook").await.unwrap();
        let socket = h.connector.socket(&tenant("T1")).unwrap();

        h.registry.shutdown().await;

        assert!(h.registry.is_empty());
        assert_eq!(h.local.records().len(), 1);
        assert!(h.disk.get(&tenant("T1")).is_some());
        assert_eq!(socket.handle().logouts(), 0);
        assert!(socket.handle().terminations() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_tenant_operations() {
        let h = harness(None);
        let unknown = tenant("nope");

        assert!(h.registry.get_status(&unknown).unwrap_err().is_not_found());
        assert!(h.registry.get_pairing_artifact(&unknown).unwrap_err().is_not_found());
        assert!(h.registry.send_text(&unknown, "555", "hi").await.unwrap_err().is_not_found());
        assert!(h.registry.list_identifier_mappings(&unknown).unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_identifier_mappings_through_registry() {
        let h = harness(None);
        h.registry.create(tenant("T1"), "https://x/hook").await.unwrap();

        assert!(h.registry.add_identifier_mapping(&tenant("T1"), "1@lid", "111").unwrap());
        assert!(!h.registry.add_identifier_mapping(&tenant("T1"), "1@lid", "111").unwrap());
        assert!(h
            .registry
            .add_identifier_mapping(&tenant("T1"), " ", "111")
            .unwrap_err()
            .is_validation());

        let mappings = h.registry.list_identifier_mappings(&tenant("T1")).unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].opaque_id, "1@lid");
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_counts_and_listing() {
        let h = harness(None);
        h.registry.create(tenant("B"), "https://x/B").await.unwrap();
        h.registry.create(tenant("A"), "https://x/A").await.unwrap();
        h.connector.socket(&tenant("A")).unwrap().open().await;
        settle().await;

        let counts = h.registry.status_counts();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.connected, 1);
        assert_eq!(counts.connecting, 1);

        let listed: Vec<_> = h.registry.list().into_iter().map(|s| s.tenant_id).collect();
        assert_eq!(listed, vec![tenant("A"), tenant("B")]);
    }
}
