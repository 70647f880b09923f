//! Credential database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for session_credentials table
#[derive(Debug, Clone, FromRow)]
pub struct CredentialModel {
    pub tenant_id: String,
    pub blob: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
