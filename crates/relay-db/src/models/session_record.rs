//! Session record database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for session_records table
#[derive(Debug, Clone, FromRow)]
pub struct SessionRecordModel {
    pub tenant_id: String,
    pub webhook_url: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_connected_at: Option<DateTime<Utc>>,
}
