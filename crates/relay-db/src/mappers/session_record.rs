//! Session record entity <-> model mapper

use chrono::{DateTime, Utc};
use relay_core::{DomainError, SessionRecord, SessionStatus, TenantId};

use crate::models::SessionRecordModel;

/// Convert SessionRecordModel to SessionRecord entity
impl TryFrom<SessionRecordModel> for SessionRecord {
    type Error = DomainError;

    fn try_from(model: SessionRecordModel) -> Result<Self, Self::Error> {
        let tenant_id = TenantId::parse(&model.tenant_id)?;
        // Unknown status strings degrade to the idle state
        let status = SessionStatus::from_str(&model.status).unwrap_or_default();

        Ok(SessionRecord {
            tenant_id,
            webhook_url: model.webhook_url,
            status,
            created_at: model.created_at,
            last_connected_at: model.last_connected_at,
        })
    }
}

/// Column values for an upsert
pub struct SessionRecordInsert<'a> {
    pub tenant_id: &'a str,
    pub webhook_url: &'a str,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl<'a> SessionRecordInsert<'a> {
    pub fn new(record: &'a SessionRecord) -> Self {
        Self {
            tenant_id: record.tenant_id.as_str(),
            webhook_url: &record.webhook_url,
            status: record.status.as_str(),
            created_at: record.created_at,
            last_connected_at: record.last_connected_at,
        }
    }
}
