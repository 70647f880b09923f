//! Session - one tenant's protocol socket and its lifecycle
//!
//! Protocol events arrive on a per-socket channel and are handled one at a time,
//! in emission order, by [`Session::handle_event`]. Every socket gets a fresh
//! epoch; events and timers that belong to an older epoch are dropped, and once
//! `closing` or `deleted` is set nothing further happens for the tenant.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use relay_core::{
    Credentials, DomainError, InboundMessage, NoopObjectStore, ObjectStore, OutboundContent,
    ProtocolConnector, ProtocolEvent, ProtocolHandle, SessionStatus, StateChange, TenantId,
};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::state::SessionState;
use super::{
    IdentifierCache, IdentifierMapping, PairingArtifact, SessionPolicy, SessionSnapshot,
    StatusUpdate,
};
use crate::credentials::CredentialStore;
use crate::events::{
    ConnectionUpdatePayload, IdentityResolvedPayload, MessageReceivedPayload, MessageSentPayload,
    PairingPayload, WebhookEventType,
};
use crate::protocol::{CloseClass, DisconnectReason};
use crate::webhook::WebhookDispatcher;

/// Collaborators shared by every session of a registry
#[derive(Clone)]
pub struct SessionDeps {
    pub connector: Arc<dyn ProtocolConnector>,
    pub credentials: Arc<CredentialStore>,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub object_store: Arc<dyn ObjectStore>,
}

impl SessionDeps {
    /// Dependencies with no media storage configured
    #[must_use]
    pub fn new(
        connector: Arc<dyn ProtocolConnector>,
        credentials: Arc<CredentialStore>,
        dispatcher: Arc<WebhookDispatcher>,
    ) -> Self {
        Self {
            connector,
            credentials,
            dispatcher,
            object_store: Arc::new(NoopObjectStore),
        }
    }

    #[must_use]
    pub fn with_object_store(mut self, object_store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = object_store;
        self
    }
}

/// A single tenant session
pub struct Session {
    tenant_id: TenantId,
    policy: SessionPolicy,
    deps: SessionDeps,
    webhook_url: RwLock<String>,
    state: Mutex<SessionState>,
    identifiers: IdentifierCache,
    closing: AtomicBool,
    deleted: AtomicBool,
    /// Bumped on every connect
    epoch: AtomicU64,
    /// Serializes connects so two sockets never open at once
    connect_lock: tokio::sync::Mutex<()>,
    /// Wakes sleeping timers and webhook retries once the session stops
    shutdown: CancellationToken,
    updates: Option<mpsc::UnboundedSender<StatusUpdate>>,
}

impl Session {
    /// Create a disconnected session; nothing happens until [`connect`](Self::connect)
    pub fn new(
        tenant_id: TenantId,
        webhook_url: impl Into<String>,
        policy: SessionPolicy,
        deps: SessionDeps,
        updates: Option<mpsc::UnboundedSender<StatusUpdate>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SessionState::new(policy.rate_limit_per_minute)),
            tenant_id,
            policy,
            deps,
            webhook_url: RwLock::new(webhook_url.into()),
            identifiers: IdentifierCache::new(),
            closing: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            connect_lock: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
            updates,
        })
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn webhook_url(&self) -> String {
        self.webhook_url.read().clone()
    }

    pub fn set_webhook_url(&self, url: impl Into<String>) {
        *self.webhook_url.write() = url.into();
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let webhook_url = self.webhook_url();
        let state = self.state.lock();
        SessionSnapshot {
            tenant_id: self.tenant_id.clone(),
            status: state.status,
            reconnect_attempts: state.reconnect_attempts,
            last_activity: state.last_activity,
            last_reconnect_delay_ms: state.last_reconnect_delay_ms,
            has_pairing_artifact: state.pairing.is_some(),
            webhook_url,
        }
    }

    /// Latest pairing artifact, present while the session waits for pairing
    pub fn pairing_artifact(&self) -> Option<PairingArtifact> {
        self.state.lock().pairing.clone()
    }

    pub fn identifier_mappings(&self) -> Vec<IdentifierMapping> {
        self.identifiers.list()
    }

    /// Teach the session an opaque identifier mapping
    pub fn add_identifier_mapping(&self, opaque_id: &str, address: &str) -> bool {
        self.identifiers.insert(opaque_id, address)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub(super) fn is_stopped(&self) -> bool {
        self.is_closing() || self.is_deleted()
    }

    /// Whether callbacks of socket `epoch` may still act
    pub(super) fn is_live(&self, epoch: u64) -> bool {
        !self.is_stopped() && self.epoch.load(Ordering::SeqCst) == epoch
    }

    pub(super) fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub(super) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(super) fn socket_is_open(&self) -> bool {
        self.state
            .lock()
            .handle
            .as_ref()
            .is_some_and(|handle| handle.is_open())
    }

    pub(super) fn take_handle(&self) -> Option<Arc<dyn ProtocolHandle>> {
        let mut state = self.state.lock();
        state.connected_at = None;
        state.handle.take()
    }

    /// Take the handle only while `epoch` is current, so a stale event never
    /// retires the socket of a newer connect
    pub(super) fn take_live_handle(&self, epoch: u64) -> Option<Arc<dyn ProtocolHandle>> {
        let mut state = self.state.lock();
        if !self.is_live(epoch) {
            return None;
        }
        state.connected_at = None;
        state.handle.take()
    }

    /// Load credentials and open a fresh socket
    ///
    /// No-op once the session is closing or deleted. Open failures count as
    /// transient closes and go through the reconnect policy.
    pub async fn connect(self: &Arc<Self>) {
        if self.is_stopped() {
            return;
        }
        let _guard = self.connect_lock.lock().await;
        if self.is_stopped() {
            return;
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.take_handle() {
            previous.terminate().await;
        }

        self.set_status(SessionStatus::Connecting, None);
        let credentials = self.deps.credentials.load(&self.tenant_id).await;
        if !self.is_live(epoch) {
            return;
        }

        match self.deps.connector.open(&self.tenant_id, credentials).await {
            Ok(connection) => {
                let accepted = {
                    let mut state = self.state.lock();
                    if self.is_live(epoch) {
                        state.handle = Some(Arc::clone(&connection.handle));
                        true
                    } else {
                        false
                    }
                };
                if !accepted {
                    connection.handle.terminate().await;
                    return;
                }

                tracing::info!(tenant_id = %self.tenant_id, epoch, "Protocol socket opened");
                let session = Arc::clone(self);
                tokio::spawn(async move {
                    session.run_events(epoch, connection.events).await;
                });
            }
            Err(e) => {
                tracing::warn!(
                    tenant_id = %self.tenant_id,
                    error = %e,
                    "Failed to open protocol socket"
                );
                self.schedule_reconnect(epoch, format!("open failed: {e}"));
            }
        }
    }

    /// Close the current socket and open a new one, keeping credentials
    pub async fn reopen(self: &Arc<Self>) {
        if self.is_stopped() {
            return;
        }
        self.state.lock().reconnect_attempts = 0;
        self.connect().await;
    }

    /// Stop for good: flags first, then best-effort logout, then force-close
    pub async fn destroy(&self) {
        self.deleted.store(true, Ordering::SeqCst);
        self.closing.store(true, Ordering::SeqCst);
        self.shutdown.cancel();

        let handle = {
            let mut state = self.state.lock();
            state.status = SessionStatus::Disconnected;
            state.pairing = None;
            state.connected_at = None;
            state.handle.take()
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.logout().await {
                tracing::warn!(tenant_id = %self.tenant_id, error = %e, "Logout failed");
            }
            handle.terminate().await;
        }

        tracing::info!(tenant_id = %self.tenant_id, "Session destroyed");
    }

    /// Stop without logging out, leaving credentials usable for the next boot
    pub async fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.shutdown.cancel();

        if let Some(handle) = self.take_handle() {
            handle.terminate().await;
        }
        tracing::debug!(tenant_id = %self.tenant_id, "Session closed");
    }

    /// Spawn a connect after `delay`, unless socket `epoch` has been superseded
    pub(super) fn schedule_connect(self: &Arc<Self>, epoch: u64, delay: Duration) {
        let session = Arc::clone(self);
        let task: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            if !delay.is_zero() {
                tokio::select! {
                    () = session.shutdown.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            if !session.is_live(epoch) {
                tracing::debug!(tenant_id = %session.tenant_id, "Dropping stale reconnect");
                return;
            }
            session.connect().await;
        });
        tokio::spawn(task);
    }

    fn schedule_reconnect(self: &Arc<Self>, epoch: u64, reason: String) {
        let policy = self.policy.reconnect;
        let next = {
            let mut state = self.state.lock();
            if policy.allows(state.reconnect_attempts) {
                let delay = policy.delay_for(state.reconnect_attempts);
                state.reconnect_attempts += 1;
                state.last_reconnect_delay_ms =
                    Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
                Some((delay, state.reconnect_attempts))
            } else {
                None
            }
        };

        if let Some((delay, attempt)) = next {
            tracing::info!(
                tenant_id = %self.tenant_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "Scheduling reconnect"
            );
            self.set_status(SessionStatus::Connecting, Some(reason));
            self.schedule_connect(epoch, delay);
        } else {
            tracing::warn!(
                tenant_id = %self.tenant_id,
                max_attempts = policy.max_attempts,
                "Reconnect attempts exhausted"
            );
            self.set_status(
                SessionStatus::Disconnected,
                Some(format!("{reason}; reconnect attempts exhausted")),
            );
        }
    }

    async fn run_events(self: Arc<Self>, epoch: u64, mut events: mpsc::Receiver<ProtocolEvent>) {
        loop {
            let event = tokio::select! {
                () = self.shutdown.cancelled() => break,
                event = events.recv() => event,
            };
            let Some(event) = event else { break };
            if !self.is_live(epoch) {
                break;
            }
            self.handle_event(epoch, event).await;
        }
        tracing::debug!(tenant_id = %self.tenant_id, epoch, "Event loop ended");
    }

    // =========================================================================
    // Event handling
    // =========================================================================

    /// Single entry point for every protocol event of socket `epoch`
    pub(super) async fn handle_event(self: &Arc<Self>, epoch: u64, event: ProtocolEvent) {
        if !self.is_live(epoch) {
            return;
        }
        tracing::trace!(tenant_id = %self.tenant_id, event = event.name(), "Protocol event");

        match event {
            ProtocolEvent::PairingCodeNeeded(code) => self.on_pairing_code(&code),
            ProtocolEvent::StateChanged(StateChange::Open) => self.on_open(epoch),
            ProtocolEvent::StateChanged(StateChange::Closed(code)) => {
                self.on_closed(epoch, code).await;
            }
            ProtocolEvent::MessageReceived(message) => self.on_message(epoch, message).await,
            ProtocolEvent::IdentityHint {
                opaque_id,
                external_address,
            } => self.learn_identifier(&opaque_id, &external_address),
            ProtocolEvent::CredentialsUpdated(credentials) => {
                self.on_credentials_updated(&credentials).await;
            }
        }
    }

    fn on_pairing_code(&self, code: &str) {
        let artifact = PairingArtifact::render(code);
        let payload = PairingPayload {
            code: artifact.code.clone(),
            image: artifact.image.clone(),
        };
        self.state.lock().pairing = Some(artifact);

        tracing::info!(tenant_id = %self.tenant_id, "Pairing code issued");
        self.set_status(SessionStatus::RequiresPairing, None);
        self.emit(WebhookEventType::IdentityPairing, &payload);
    }

    fn on_open(self: &Arc<Self>, epoch: u64) {
        {
            let mut state = self.state.lock();
            state.reconnect_attempts = 0;
            state.last_activity = Some(Utc::now());
            state.pairing = None;
            // Grace period starts now
            state.connected_at = Some(Instant::now());
        }
        self.set_status(SessionStatus::Connected, None);
        self.start_watchdog(epoch);
    }

    async fn on_closed(self: &Arc<Self>, epoch: u64, code: u16) {
        let reason = DisconnectReason::describe(code);
        if let Some(handle) = self.take_live_handle(epoch) {
            handle.terminate().await;
        }
        if !self.is_live(epoch) {
            return;
        }

        match DisconnectReason::classify(code) {
            CloseClass::Fatal => {
                tracing::warn!(tenant_id = %self.tenant_id, code, "Credentials rejected, wiping");
                self.deps.credentials.clear(&self.tenant_id).await;
                if !self.is_live(epoch) {
                    return;
                }
                self.set_status(SessionStatus::Disconnected, Some(reason));
            }
            CloseClass::PairingExpired => {
                tracing::info!(tenant_id = %self.tenant_id, "Pairing expired, requesting a new code");
                self.deps.credentials.clear(&self.tenant_id).await;
                if !self.is_live(epoch) {
                    return;
                }
                self.set_status(SessionStatus::Connecting, Some(reason));
                self.schedule_connect(epoch, Duration::ZERO);
            }
            CloseClass::Transient => self.schedule_reconnect(epoch, reason),
        }
    }

    async fn on_message(&self, epoch: u64, message: InboundMessage) {
        let from = self.resolve_sender(&message).await;
        if !self.is_live(epoch) {
            return;
        }

        let mut media_url = None;
        if let Some(media) = &message.media {
            match self
                .deps
                .object_store
                .put(&media.data, &media.mime_type, &self.tenant_id)
                .await
            {
                Ok(url) => media_url = url,
                Err(e) => {
                    tracing::warn!(
                        tenant_id = %self.tenant_id,
                        message_id = %message.message_id,
                        error = %e,
                        "Media upload failed"
                    );
                }
            }
            if !self.is_live(epoch) {
                return;
            }
        }

        let payload = MessageReceivedPayload {
            message_id: message.message_id,
            from,
            sender: message.sender,
            push_name: message.push_name,
            text: message.text,
            from_me: message.from_me,
            timestamp: message.timestamp,
            media_url,
            mime_type: message.media.as_ref().map(|m| m.mime_type.clone()),
            file_name: message.media.and_then(|m| m.file_name),
        };
        self.emit(WebhookEventType::MessageReceived, &payload);
    }

    async fn on_credentials_updated(&self, credentials: &Credentials) {
        if let Err(e) = self.deps.credentials.save(&self.tenant_id, credentials).await {
            tracing::error!(tenant_id = %self.tenant_id, error = %e, "Failed to persist credentials");
        }
    }

    /// Resolve a sender to a stable address
    ///
    /// Order: the alternate address on the event, the identifier cache, then a
    /// lookup against the protocol. Unresolvable senders yield an empty address.
    async fn resolve_sender(&self, message: &InboundMessage) -> String {
        if !message.sender_is_opaque {
            return message.sender.clone();
        }

        if let Some(alt) = message.sender_alt.as_deref().filter(|a| !a.is_empty()) {
            self.learn_identifier(&message.sender, alt);
            return alt.to_string();
        }

        if let Some(cached) = self.identifiers.get(&message.sender) {
            return cached;
        }

        let handle = self.state.lock().handle.clone();
        if let Some(handle) = handle {
            match handle.resolve_identifier(&message.sender).await {
                Ok(Some(address)) if !address.is_empty() => {
                    self.learn_identifier(&message.sender, &address);
                    return address;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        tenant_id = %self.tenant_id,
                        sender = %message.sender,
                        error = %e,
                        "Identifier lookup failed"
                    );
                }
            }
        }

        tracing::debug!(tenant_id = %self.tenant_id, sender = %message.sender, "Sender left unresolved");
        String::new()
    }

    fn learn_identifier(&self, opaque_id: &str, address: &str) {
        if self.identifiers.insert(opaque_id, address) {
            self.emit(
                WebhookEventType::IdentityResolved,
                &IdentityResolvedPayload {
                    opaque_id: opaque_id.to_string(),
                    address: address.to_string(),
                },
            );
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Send content through the open socket
    ///
    /// Fails fast when not connected, inside the post-connect grace period, or
    /// over the rate limit. Failures are returned, never retried.
    pub async fn send(&self, address: &str, content: OutboundContent) -> Result<String, DomainError> {
        if self.is_stopped() {
            return Err(DomainError::SessionClosed);
        }
        if address.trim().is_empty() {
            return Err(DomainError::ValidationError("address is required".to_string()));
        }

        let handle = {
            let mut state = self.state.lock();
            if state.status != SessionStatus::Connected {
                return Err(DomainError::NotConnected);
            }
            let Some(handle) = state.handle.clone() else {
                return Err(DomainError::NotConnected);
            };

            let now = Instant::now();
            if let Some(connected_at) = state.connected_at {
                if now.saturating_duration_since(connected_at) < self.policy.grace_period {
                    return Err(DomainError::StillInitializing);
                }
            }

            state
                .rate
                .try_acquire(now)
                .map_err(|retry| DomainError::RateLimited {
                    retry_after_ms: u64::try_from(retry.as_millis()).unwrap_or(u64::MAX),
                })?;
            state.last_activity = Some(Utc::now());
            handle
        };

        let message_id = handle.send(address, &content).await.map_err(|e| {
            tracing::warn!(tenant_id = %self.tenant_id, error = %e, "Send failed");
            e
        })?;

        let text = match &content {
            OutboundContent::Text { text } => Some(text.clone()),
            OutboundContent::Media { caption, .. } => caption.clone(),
            OutboundContent::Reaction { emoji, .. } => Some(emoji.clone()),
        };
        self.emit(
            WebhookEventType::MessageSent,
            &MessageSentPayload {
                message_id: message_id.clone(),
                to: address.to_string(),
                content_type: content.kind().to_string(),
                text,
            },
        );

        Ok(message_id)
    }

    pub async fn send_text(&self, address: &str, text: impl Into<String>) -> Result<String, DomainError> {
        self.send(address, OutboundContent::Text { text: text.into() })
            .await
    }

    pub async fn send_media(
        &self,
        address: &str,
        mime_type: impl Into<String>,
        data: Vec<u8>,
        caption: Option<String>,
    ) -> Result<String, DomainError> {
        let mime_type = mime_type.into();
        if mime_type.is_empty() || data.is_empty() {
            return Err(DomainError::ValidationError(
                "media requires a mime type and data".to_string(),
            ));
        }
        self.send(
            address,
            OutboundContent::Media {
                mime_type,
                data,
                caption,
                file_name: None,
            },
        )
        .await
    }

    // =========================================================================
    // Status and webhooks
    // =========================================================================

    pub(super) fn set_status(&self, status: SessionStatus, reason: Option<String>) {
        if self.is_stopped() {
            return;
        }

        let (changed, reconnect_attempts) = {
            let mut state = self.state.lock();
            let changed = state.status != status;
            state.status = status;
            if status != SessionStatus::Connected {
                state.connected_at = None;
            }
            if status == SessionStatus::Disconnected {
                state.pairing = None;
            }
            (changed, state.reconnect_attempts)
        };

        if !changed && reason.is_none() {
            return;
        }

        tracing::info!(
            tenant_id = %self.tenant_id,
            status = %status,
            reason = reason.as_deref().unwrap_or(""),
            "Session status changed"
        );

        if let Some(updates) = &self.updates {
            let update = StatusUpdate {
                tenant_id: self.tenant_id.clone(),
                status,
                at: Utc::now(),
            };
            if updates.send(update).is_err() {
                tracing::debug!(tenant_id = %self.tenant_id, "Registry no longer listening");
            }
        }

        self.emit(
            WebhookEventType::ConnectionUpdate,
            &ConnectionUpdatePayload {
                status,
                reason,
                reconnect_attempts,
            },
        );
    }

    /// Hand an event to the dispatcher without waiting for delivery
    fn emit<P: Serialize>(&self, event_type: WebhookEventType, payload: &P) {
        if self.is_stopped() {
            return;
        }
        let payload = match serde_json::to_value(payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(tenant_id = %self.tenant_id, error = %e, "Unserializable payload");
                return;
            }
        };

        let url = self.webhook_url();
        let tenant_id = self.tenant_id.clone();
        let dispatcher = Arc::clone(&self.deps.dispatcher);
        let cancel = self.shutdown.clone();
        tokio::spawn(async move {
            if cancel.is_cancelled() {
                return;
            }
            dispatcher
                .dispatch_until(&url, &tenant_id, event_type, payload, &cancel)
                .await;
        });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("tenant_id", &self.tenant_id)
            .field("status", &self.status())
            .field("closing", &self.is_closing())
            .field("deleted", &self.is_deleted())
            .finish()
    }
}
