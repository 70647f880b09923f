//! Delivery envelope

use chrono::{DateTime, Utc};
use relay_core::TenantId;
use serde::{Deserialize, Serialize};

use crate::events::WebhookEventType;

/// JSON body posted to a tenant webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    pub tenant_id: TenantId,
    pub event_type: WebhookEventType,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl WebhookEnvelope {
    #[must_use]
    pub fn new(tenant_id: TenantId, event_type: WebhookEventType, payload: serde_json::Value) -> Self {
        Self {
            tenant_id,
            event_type,
            payload,
            timestamp: Utc::now(),
        }
    }
}
