//! Webhook dispatcher
//!
//! Delivers one envelope per call with exponential-backoff retries. Inbound
//! messages are deduplicated by `(tenant, messageId)` inside a TTL window; a
//! background sweeper keeps the dedup cache bounded.

use relay_common::WebhookConfig;
use relay_core::TenantId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{DedupCache, WebhookEnvelope, WebhookTransport};
use crate::events::WebhookEventType;

/// Retry and dedup policy for the dispatcher
#[derive(Debug, Clone)]
pub struct WebhookPolicy {
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub retry_base: Duration,
    pub dedup_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for WebhookPolicy {
    fn default() -> Self {
        Self::from(&WebhookConfig::default())
    }
}

impl From<&WebhookConfig> for WebhookPolicy {
    fn from(config: &WebhookConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(config.retry_base_ms),
            dedup_ttl: Duration::from_secs(config.dedup_ttl_secs),
            sweep_interval: Duration::from_secs(config.dedup_sweep_secs),
        }
    }
}

impl WebhookPolicy {
    /// Backoff before retry number `retry` (1-based)
    #[must_use]
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.retry_base.saturating_mul(factor)
    }
}

/// Outbound event dispatcher shared by every session
pub struct WebhookDispatcher {
    transport: Arc<dyn WebhookTransport>,
    policy: WebhookPolicy,
    dedup: DedupCache,
    /// Whether the sweeper is running
    running: AtomicBool,
    shutdown: CancellationToken,
}

impl WebhookDispatcher {
    #[must_use]
    pub fn new(transport: Arc<dyn WebhookTransport>, policy: WebhookPolicy) -> Self {
        Self {
            transport,
            dedup: DedupCache::new(policy.dedup_ttl),
            policy,
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Start the dedup sweeper
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Webhook dispatcher is already running");
            return;
        }

        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.run_sweeper().await;
        });

        tracing::info!("Webhook dispatcher started");
    }

    /// Stop the sweeper and cancel in-flight retry sleeps
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        tracing::info!("Webhook dispatcher stopped");
    }

    /// Check if the sweeper is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run_sweeper(&self) {
        let mut ticker = tokio::time::interval(self.policy.sweep_interval);
        // The first tick completes immediately
        ticker.tick().await;

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = self.dedup.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.dedup.len(), "Dedup cache swept");
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::debug!("Dedup sweeper ended");
    }

    /// Deliver one event, returning whether the webhook accepted it
    pub async fn dispatch(
        &self,
        url: &str,
        tenant_id: &TenantId,
        event_type: WebhookEventType,
        payload: serde_json::Value,
    ) -> bool {
        self.dispatch_until(url, tenant_id, event_type, payload, &CancellationToken::new())
            .await
    }

    /// Like [`dispatch`](Self::dispatch), abandoning retries once `cancel` fires
    pub async fn dispatch_until(
        &self,
        url: &str,
        tenant_id: &TenantId,
        event_type: WebhookEventType,
        payload: serde_json::Value,
        cancel: &CancellationToken,
    ) -> bool {
        if url.is_empty() {
            tracing::trace!(tenant_id = %tenant_id, event_type = %event_type, "No webhook configured");
            return false;
        }

        if event_type.is_deduplicated() {
            if let Some(message_id) = payload.get("messageId").and_then(|v| v.as_str()) {
                if !self
                    .dedup
                    .check_and_insert(DedupCache::key(tenant_id, message_id))
                {
                    tracing::debug!(
                        tenant_id = %tenant_id,
                        message_id,
                        "Duplicate message suppressed"
                    );
                    return false;
                }
            }
        }

        let envelope = WebhookEnvelope::new(tenant_id.clone(), event_type, payload);
        let attempts = self.policy.max_retries.saturating_add(1);

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.policy.retry_delay(attempt - 1);
                tokio::select! {
                    () = cancel.cancelled() => return false,
                    () = self.shutdown.cancelled() => return false,
                    () = tokio::time::sleep(delay) => {}
                }
            }

            match self.transport.post(url, &envelope).await {
                Ok(()) => {
                    tracing::trace!(
                        tenant_id = %tenant_id,
                        event_type = %event_type,
                        attempt,
                        "Webhook delivered"
                    );
                    return true;
                }
                Err(e) => {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        event_type = %event_type,
                        attempt,
                        error = %e,
                        "Webhook delivery failed"
                    );
                }
            }
        }

        tracing::error!(
            tenant_id = %tenant_id,
            event_type = %event_type,
            attempts,
            "Webhook delivery abandoned"
        );
        false
    }

    /// Number of keys currently held by the dedup window
    pub fn dedup_len(&self) -> usize {
        self.dedup.len()
    }
}

impl Drop for WebhookDispatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDispatcher")
            .field("policy", &self.policy)
            .field("dedup_len", &self.dedup.len())
            .field("running", &self.is_running())
            .finish()
    }
}
