//! Test helpers for integration tests
//!
//! Provides an in-process gateway wired to a wiremock webhook endpoint, plus
//! polling utilities for asserting on asynchronous delivery.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relay_core::{SessionStatus, TenantId};
use relay_gateway::testing::{FakeConnector, FakeSocket};
use relay_gateway::{
    CredentialStore, InstanceRegistry, LocalDiskCredentialSource, LocalRecordFile, RecordStore,
    ReqwestTransport, SessionDeps, SessionPolicy, WebhookDispatcher, WebhookPolicy,
};
use serde_json::Value;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::fixtures::{fast_session_policy, fast_webhook_policy};

/// Default wait for asynchronous effects
pub const WAIT: Duration = Duration::from_secs(5);

/// Poll `check` until it returns true or `timeout` elapses
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ============================================================================
// Webhook endpoint
// ============================================================================

/// Webhook endpoint recording every envelope it receives
pub struct WebhookSink {
    server: MockServer,
}

impl WebhookSink {
    /// Endpoint accepting everything
    pub async fn start() -> Self {
        Self::failing_first(0).await
    }

    /// Endpoint answering 500 to the first `failures` requests
    pub async fn failing_first(failures: u64) -> Self {
        let server = MockServer::start().await;
        if failures > 0 {
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(500))
                .up_to_n_times(failures)
                .with_priority(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Self { server }
    }

    /// Base URL for webhook normalization
    pub fn base_url(&self) -> String {
        format!("{}/hooks", self.server.uri())
    }

    /// Webhook URL of one tenant
    pub fn url(&self, tenant_id: &TenantId) -> String {
        format!("{}/{}", self.base_url(), tenant_id)
    }

    /// Every envelope received so far, in arrival order
    pub async fn envelopes(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|req| req.body_json::<Value>().ok())
            .collect()
    }

    /// Envelopes of one event type
    pub async fn events_of(&self, event_type: &str) -> Vec<Value> {
        self.envelopes()
            .await
            .into_iter()
            .filter(|e| e["eventType"] == event_type)
            .collect()
    }

    /// Wait until at least `count` envelopes of `event_type` arrived
    pub async fn wait_for(&self, event_type: &str, count: usize) -> Result<Vec<Value>> {
        let arrived = eventually(WAIT, || async move {
            self.events_of(event_type).await.len() >= count
        })
        .await;
        anyhow::ensure!(arrived, "timed out waiting for {count} {event_type} event(s)");
        Ok(self.events_of(event_type).await)
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Registry plus the fakes driving it
pub struct TestGateway {
    pub registry: Arc<InstanceRegistry>,
    pub connector: Arc<FakeConnector>,
    pub dispatcher: Arc<WebhookDispatcher>,
    data_dir: PathBuf,
}

impl TestGateway {
    /// Start a gateway with fast policies and local tiers under `data_dir`
    pub async fn start(data_dir: &Path) -> Result<Self> {
        Self::start_with(data_dir, None, fast_session_policy(), fast_webhook_policy()).await
    }

    /// Start a gateway with a webhook base URL for bootstrap normalization
    pub async fn start_with(
        data_dir: &Path,
        webhook_base: Option<String>,
        session_policy: SessionPolicy,
        webhook_policy: WebhookPolicy,
    ) -> Result<Self> {
        let connector = Arc::new(FakeConnector::new());

        let transport = ReqwestTransport::new(Duration::from_secs(2))
            .context("failed to build webhook client")?;
        let dispatcher = Arc::new(WebhookDispatcher::new(Arc::new(transport), webhook_policy));
        dispatcher.start();

        let credentials = CredentialStore::new(Arc::new(LocalDiskCredentialSource::new(
            data_dir.join("sessions"),
        )));
        let records = RecordStore::new(Arc::new(LocalRecordFile::new(
            data_dir.join("instances.json"),
        )));

        let deps = SessionDeps::new(connector.clone(), Arc::new(credentials), dispatcher.clone());
        let registry = InstanceRegistry::new(deps, records, session_policy, webhook_base);

        Ok(Self {
            registry,
            connector,
            dispatcher,
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Credential folder of one tenant
    pub fn tenant_dir(&self, tenant_id: &TenantId) -> PathBuf {
        self.data_dir.join("sessions").join(tenant_id.as_str())
    }

    /// Most recently opened socket of a tenant
    pub fn socket(&self, tenant_id: &TenantId) -> Result<FakeSocket> {
        self.connector
            .socket(tenant_id)
            .with_context(|| format!("no socket opened for {tenant_id}"))
    }

    /// Wait until a tenant has opened `count` sockets
    pub async fn wait_for_opens(&self, tenant_id: &TenantId, count: usize) -> Result<()> {
        let opened = eventually(WAIT, || async move {
            self.connector.open_count(tenant_id) >= count
        })
        .await;
        anyhow::ensure!(opened, "timed out waiting for {count} open(s) of {tenant_id}");
        Ok(())
    }

    /// Wait until a tenant reaches `status`
    pub async fn wait_for_status(&self, tenant_id: &TenantId, status: SessionStatus) -> Result<()> {
        let registry = &self.registry;
        let reached = eventually(WAIT, || async move {
            registry
                .get_status(tenant_id)
                .is_ok_and(|snapshot| snapshot.status == status)
        })
        .await;
        anyhow::ensure!(reached, "timed out waiting for {tenant_id} to become {status}");
        Ok(())
    }

    /// Close every session, keeping persisted state
    pub async fn stop(self) {
        self.registry.shutdown().await;
    }
}
