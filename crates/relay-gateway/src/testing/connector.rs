//! Scriptable protocol connector

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{
    Credentials, DomainError, InboundMessage, OutboundContent, ProtocolConnection,
    ProtocolConnector, ProtocolEvent, ProtocolHandle, RepoResult, StateChange, TenantId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Connector whose sockets are driven by the test
#[derive(Default)]
pub struct FakeConnector {
    sockets: Mutex<Vec<FakeSocket>>,
    fail_opens: AtomicU32,
    resolutions: Arc<Mutex<HashMap<String, String>>>,
}

impl FakeConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` opens fail
    pub fn fail_next_opens(&self, n: u32) {
        self.fail_opens.store(n, Ordering::SeqCst);
    }

    /// Answer for `resolve_identifier` on every socket
    pub fn add_resolution(&self, opaque_id: &str, address: &str) {
        self.resolutions
            .lock()
            .insert(opaque_id.to_string(), address.to_string());
    }

    /// Successful opens for a tenant
    pub fn open_count(&self, tenant_id: &TenantId) -> usize {
        self.sockets
            .lock()
            .iter()
            .filter(|s| &s.tenant_id == tenant_id)
            .count()
    }

    pub fn total_opens(&self) -> usize {
        self.sockets.lock().len()
    }

    /// Most recently opened socket of a tenant
    pub fn socket(&self, tenant_id: &TenantId) -> Option<FakeSocket> {
        self.sockets
            .lock()
            .iter()
            .rev()
            .find(|s| &s.tenant_id == tenant_id)
            .cloned()
    }
}

#[async_trait]
impl ProtocolConnector for FakeConnector {
    async fn open(
        &self,
        tenant_id: &TenantId,
        credentials: Credentials,
    ) -> RepoResult<ProtocolConnection> {
        let failing = self
            .fail_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DomainError::ProtocolError("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::channel(64);
        let handle = Arc::new(FakeHandle::new(Arc::clone(&self.resolutions)));
        self.sockets.lock().push(FakeSocket {
            tenant_id: tenant_id.clone(),
            credentials,
            events: tx,
            handle: Arc::clone(&handle),
        });

        Ok(ProtocolConnection {
            handle,
            events: rx,
        })
    }
}

/// Test-side view of one opened socket
#[derive(Clone)]
pub struct FakeSocket {
    pub tenant_id: TenantId,
    /// Credentials the socket was opened with
    pub credentials: Credentials,
    events: mpsc::Sender<ProtocolEvent>,
    handle: Arc<FakeHandle>,
}

impl FakeSocket {
    /// Push an event; returns false once the session stopped listening
    pub async fn emit(&self, event: ProtocolEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    pub async fn pairing_code(&self, code: &str) -> bool {
        self.emit(ProtocolEvent::PairingCodeNeeded(code.to_string()))
            .await
    }

    pub async fn open(&self) -> bool {
        self.emit(ProtocolEvent::StateChanged(StateChange::Open)).await
    }

    pub async fn close(&self, code: u16) -> bool {
        self.handle.set_open(false);
        self.emit(ProtocolEvent::StateChanged(StateChange::Closed(code)))
            .await
    }

    pub async fn message(&self, message: InboundMessage) -> bool {
        self.emit(ProtocolEvent::MessageReceived(message)).await
    }

    pub async fn hint(&self, opaque_id: &str, address: &str) -> bool {
        self.emit(ProtocolEvent::IdentityHint {
            opaque_id: opaque_id.to_string(),
            external_address: address.to_string(),
        })
        .await
    }

    pub async fn credentials_updated(&self, credentials: Credentials) -> bool {
        self.emit(ProtocolEvent::CredentialsUpdated(credentials))
            .await
    }

    pub fn handle(&self) -> &Arc<FakeHandle> {
        &self.handle
    }
}

/// Outbound side of a fake socket, recording every call
pub struct FakeHandle {
    open: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<(String, OutboundContent)>>,
    logouts: AtomicUsize,
    terminations: AtomicUsize,
    resolve_calls: AtomicUsize,
    resolutions: Arc<Mutex<HashMap<String, String>>>,
}

impl FakeHandle {
    fn new(resolutions: Arc<Mutex<HashMap<String, String>>>) -> Self {
        Self {
            open: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            logouts: AtomicUsize::new(0),
            terminations: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            resolutions,
        }
    }

    /// Simulate the socket dying (or recovering) without an event
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, OutboundContent)> {
        self.sent.lock().clone()
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolHandle for FakeHandle {
    async fn send(&self, address: &str, content: &OutboundContent) -> RepoResult<String> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(DomainError::ProtocolError("send rejected".to_string()));
        }
        self.sent.lock().push((address.to_string(), content.clone()));
        Ok(format!("OUT-{}", uuid::Uuid::new_v4().simple()))
    }

    async fn resolve_identifier(&self, opaque_id: &str) -> RepoResult<Option<String>> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.resolutions.lock().get(opaque_id).cloned())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn logout(&self) -> RepoResult<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn terminate(&self) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }
}
