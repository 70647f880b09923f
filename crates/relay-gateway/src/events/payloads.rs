//! Webhook event payloads
//!
//! Serialized into the `payload` field of the delivery envelope.

use chrono::{DateTime, Utc};
use relay_core::SessionStatus;
use serde::{Deserialize, Serialize};

/// Payload for `identity.pairing`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingPayload {
    /// Raw pairing code
    pub code: String,
    /// QR rendering as a data URL, null when the code does not fit a symbol
    pub image: Option<String>,
}

/// Payload for `connection.update`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdatePayload {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub reconnect_attempts: u32,
}

/// Payload for `message.received`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceivedPayload {
    /// Protocol-assigned message ID (dedup identity)
    pub message_id: String,
    /// Resolved external address of the sender; empty when resolution failed
    pub from: String,
    /// Sender exactly as the protocol reported it
    pub sender: String,
    pub push_name: Option<String>,
    pub text: Option<String>,
    pub from_me: bool,
    pub timestamp: DateTime<Utc>,
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Payload for `message.sent`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSentPayload {
    /// Protocol delivery ID
    pub message_id: String,
    pub to: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Payload for `identity.resolved`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResolvedPayload {
    pub opaque_id: String,
    pub address: String,
}
