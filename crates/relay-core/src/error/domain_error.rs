//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::{TenantId, TenantIdError};

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Caller Errors
    // =========================================================================
    #[error("Tenant not found: {0}")]
    TenantNotFound(TenantId),

    #[error("Tenant already exists: {0}")]
    TenantAlreadyExists(TenantId),

    #[error("Invalid tenant id: {0}")]
    InvalidTenantId(#[from] TenantIdError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    // =========================================================================
    // Send Path Errors
    // =========================================================================
    #[error("Session is not connected")]
    NotConnected,

    #[error("Session is still initializing, retry shortly")]
    StillInitializing,

    #[error("Rate limit exceeded, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Session has been closed")]
    SessionClosed,

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::TenantNotFound(_) => "UNKNOWN_TENANT",
            Self::TenantAlreadyExists(_) => "TENANT_ALREADY_EXISTS",
            Self::InvalidTenantId(_) => "INVALID_TENANT_ID",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::NotConnected => "NOT_CONNECTED",
            Self::StillInitializing => "STILL_INITIALIZING",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::SessionClosed => "SESSION_CLOSED",
            Self::ProtocolError(_) => "PROTOCOL_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::StorageError(_) => "STORAGE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TenantNotFound(_))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidTenantId(_) | Self::ValidationError(_))
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::TenantAlreadyExists(_))
    }

    /// Check if the session cannot currently accept sends
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::StillInitializing | Self::RateLimited { .. } | Self::SessionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::parse("T1").unwrap()
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(DomainError::TenantNotFound(tenant()).code(), "UNKNOWN_TENANT");
        assert_eq!(DomainError::StillInitializing.code(), "STILL_INITIALIZING");
        assert_eq!(
            DomainError::RateLimited { retry_after_ms: 10 }.code(),
            "RATE_LIMITED"
        );
    }

    #[test]
    fn test_classification() {
        assert!(DomainError::TenantNotFound(tenant()).is_not_found());
        assert!(DomainError::TenantAlreadyExists(tenant()).is_conflict());
        assert!(DomainError::from(TenantIdError::Empty).is_validation());
        assert!(DomainError::NotConnected.is_unavailable());
        assert!(!DomainError::CacheError("down".to_string()).is_unavailable());
    }

    #[test]
    fn test_error_display() {
        let err = DomainError::TenantNotFound(tenant());
        assert_eq!(err.to_string(), "Tenant not found: T1");

        let err = DomainError::RateLimited { retry_after_ms: 1500 };
        assert_eq!(err.to_string(), "Rate limit exceeded, retry in 1500ms");
    }
}
