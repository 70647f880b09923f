//! Test fixtures and data generators

use relay_core::{InboundMessage, TenantId};
use relay_gateway::session::ReconnectPolicy;
use relay_gateway::{SessionPolicy, WebhookPolicy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A tenant id no other test uses
pub fn unique_tenant() -> TenantId {
    TenantId::parse(&format!("tenant-{}", unique_suffix())).expect("valid tenant id")
}

/// Session policy with short timers so real-clock tests stay fast
pub fn fast_session_policy() -> SessionPolicy {
    SessionPolicy {
        reconnect: ReconnectPolicy {
            base: Duration::from_millis(50),
            cap: Duration::from_millis(400),
            max_attempts: 5,
        },
        grace_period: Duration::from_millis(300),
        watchdog_interval: Duration::from_secs(30),
        rate_limit_per_minute: 30,
    }
}

/// Webhook policy with short retry delays
pub fn fast_webhook_policy() -> WebhookPolicy {
    WebhookPolicy {
        max_retries: 3,
        retry_base: Duration::from_millis(20),
        dedup_ttl: Duration::from_secs(60),
        sweep_interval: Duration::from_secs(30),
    }
}

/// Inbound text message from a stable address
pub fn text_message(message_id: &str, sender: &str, text: &str) -> InboundMessage {
    InboundMessage::text(message_id, sender, text)
}

/// Inbound text message from an opaque identifier with no alternate address
pub fn opaque_message(message_id: &str, opaque_id: &str, text: &str) -> InboundMessage {
    InboundMessage::text(message_id, opaque_id, text).with_opaque_sender(None)
}
