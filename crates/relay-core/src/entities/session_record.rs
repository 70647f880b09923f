//! Session record entity - the persisted metadata of one tenant session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::TenantId;

/// Connection status of a tenant session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Initial and terminal-idle state
    #[default]
    Disconnected,
    /// Credentials loaded, socket being opened (or waiting to reopen)
    Connecting,
    /// Waiting for the out-of-band pairing step
    RequiresPairing,
    /// Socket open and authenticated
    Connected,
}

impl SessionStatus {
    /// Get the string representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::RequiresPairing => "requires_pairing",
            Self::Connected => "connected",
        }
    }

    /// Parse a status from its string representation
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "disconnected" => Some(Self::Disconnected),
            "connecting" => Some(Self::Connecting),
            "requires_pairing" => Some(Self::RequiresPairing),
            "connected" => Some(Self::Connected),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted metadata for one tenant
///
/// Owned exclusively by the instance registry, which is the single writer of the
/// durable copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub tenant_id: TenantId,
    pub webhook_url: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Create a fresh record for a newly registered tenant
    pub fn new(tenant_id: TenantId, webhook_url: impl Into<String>) -> Self {
        Self {
            tenant_id,
            webhook_url: webhook_url.into(),
            status: SessionStatus::Disconnected,
            created_at: Utc::now(),
            last_connected_at: None,
        }
    }

    /// Apply a status transition, stamping `last_connected_at` on connect
    pub fn apply_status(&mut self, status: SessionStatus, at: DateTime<Utc>) {
        self.status = status;
        if status == SessionStatus::Connected {
            self.last_connected_at = Some(at);
        }
    }
}
