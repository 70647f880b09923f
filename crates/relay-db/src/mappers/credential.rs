//! Credentials entity <-> model mapper

use relay_core::{Credentials, DomainError};

use crate::models::CredentialModel;

/// Decode the stored jsonb blob back into credentials
impl TryFrom<CredentialModel> for Credentials {
    type Error = DomainError;

    fn try_from(model: CredentialModel) -> Result<Self, Self::Error> {
        serde_json::from_value(model.blob).map_err(|e| {
            DomainError::DatabaseError(format!(
                "corrupt credential blob for {}: {e}",
                model.tenant_id
            ))
        })
    }
}
