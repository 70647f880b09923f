//! Webhook events
//!
//! Event type names and the payload shapes delivered to tenant webhooks.

mod event_types;
mod payloads;

pub use event_types::WebhookEventType;
pub use payloads::{
    ConnectionUpdatePayload, IdentityResolvedPayload, MessageReceivedPayload,
    MessageSentPayload, PairingPayload,
};
