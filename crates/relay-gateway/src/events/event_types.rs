//! Webhook event types
//!
//! Defines all event type names carried in the `eventType` field of the envelope.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Webhook event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventType {
    /// A pairing code is waiting to be confirmed
    #[serde(rename = "identity.pairing")]
    IdentityPairing,
    /// Session status changed
    #[serde(rename = "connection.update")]
    ConnectionUpdate,
    /// Inbound message
    #[serde(rename = "message.received")]
    MessageReceived,
    /// Outbound message accepted by the protocol
    #[serde(rename = "message.sent")]
    MessageSent,
    /// A new opaque identifier mapping was learned
    #[serde(rename = "identity.resolved")]
    IdentityResolved,
}

impl WebhookEventType {
    /// Get the string representation of the event type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IdentityPairing => "identity.pairing",
            Self::ConnectionUpdate => "connection.update",
            Self::MessageReceived => "message.received",
            Self::MessageSent => "message.sent",
            Self::IdentityResolved => "identity.resolved",
        }
    }

    /// Parse an event type from a string
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "identity.pairing" => Some(Self::IdentityPairing),
            "connection.update" => Some(Self::ConnectionUpdate),
            "message.received" => Some(Self::MessageReceived),
            "message.sent" => Some(Self::MessageSent),
            "identity.resolved" => Some(Self::IdentityResolved),
            _ => None,
        }
    }

    /// Whether deliveries of this type are deduplicated by message ID
    #[must_use]
    pub const fn is_deduplicated(self) -> bool {
        matches!(self, Self::MessageReceived)
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<WebhookEventType> for String {
    fn from(event: WebhookEventType) -> Self {
        event.as_str().to_string()
    }
}
