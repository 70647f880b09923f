//! Outbound webhook delivery
//!
//! Posts event envelopes to tenant webhooks with bounded retries and suppresses
//! repeated inbound messages inside a dedup window.

mod dedup;
mod dispatcher;
mod envelope;
mod transport;

pub use dedup::DedupCache;
pub use dispatcher::{WebhookDispatcher, WebhookPolicy};
pub use envelope::WebhookEnvelope;
pub use transport::{DeliveryError, ReqwestTransport, WebhookTransport};
