//! Mutable session state and the views derived from it

use chrono::{DateTime, Utc};
use relay_core::{ProtocolHandle, SessionStatus, TenantId};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

use super::{PairingArtifact, RateLimiter};

/// State guarded by the session mutex; never held across an await
pub(crate) struct SessionState {
    pub status: SessionStatus,
    pub reconnect_attempts: u32,
    pub last_activity: Option<DateTime<Utc>>,
    /// When the current socket reported open; drives the send grace period
    pub connected_at: Option<Instant>,
    pub last_reconnect_delay_ms: Option<u64>,
    pub pairing: Option<PairingArtifact>,
    pub rate: RateLimiter,
    pub handle: Option<Arc<dyn ProtocolHandle>>,
}

impl SessionState {
    pub fn new(rate_limit_per_minute: u32) -> Self {
        Self {
            status: SessionStatus::Disconnected,
            reconnect_attempts: 0,
            last_activity: None,
            connected_at: None,
            last_reconnect_delay_ms: None,
            pairing: None,
            rate: RateLimiter::per_minute(rate_limit_per_minute),
            handle: None,
        }
    }
}

/// Point-in-time view of a session, as returned by `getStatus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub tenant_id: TenantId,
    pub status: SessionStatus,
    pub reconnect_attempts: u32,
    pub last_activity: Option<DateTime<Utc>>,
    pub last_reconnect_delay_ms: Option<u64>,
    pub has_pairing_artifact: bool,
    pub webhook_url: String,
}

/// Status transition forwarded to the registry, which persists it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub tenant_id: TenantId,
    pub status: SessionStatus,
    pub at: DateTime<Utc>,
}
