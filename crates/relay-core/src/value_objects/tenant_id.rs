//! Tenant ID - stable, externally assigned identifier of one session
//!
//! Tenant IDs become directory names on disk and key suffixes in Redis, so the
//! accepted alphabet is restricted to `[A-Za-z0-9_.-]` and the length to 64 bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Maximum accepted length in bytes
pub const MAX_TENANT_ID_LEN: usize = 64;

/// Externally assigned tenant identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TenantId(String);

impl TenantId {
    /// Parse and validate a tenant ID
    pub fn parse(s: &str) -> Result<Self, TenantIdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TenantIdError::Empty);
        }
        if trimmed.len() > MAX_TENANT_ID_LEN {
            return Err(TenantIdError::TooLong(trimmed.len()));
        }
        if trimmed == "." || trimmed == ".." {
            return Err(TenantIdError::InvalidCharacter('.'));
        }
        if let Some(c) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(TenantIdError::InvalidCharacter(c));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the inner string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Error when parsing a tenant ID
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TenantIdError {
    #[error("tenant id is empty")]
    Empty,

    #[error("tenant id is too long ({0} bytes, max {MAX_TENANT_ID_LEN})")]
    TooLong(usize),

    #[error("tenant id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for TenantId {
    type Err = TenantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TenantId::parse(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TenantId::parse(&value)
    }
}

impl Serialize for TenantId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

// Validate on the way in so persisted garbage never reaches the filesystem tier
impl<'de> Deserialize<'de> for TenantId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        TenantId::parse(&raw).map_err(serde::de::Error::custom)
    }
}
