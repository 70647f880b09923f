//! Credentials entity - opaque per-tenant authentication state
//!
//! The protocol layer owns the meaning of both halves. The gateway only moves the
//! blob between persistence tiers.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized authentication state plus incremental key material
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Core authentication state
    pub creds: serde_json::Value,
    /// Incremental key material, keyed by entry name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keys: BTreeMap<String, serde_json::Value>,
}

impl Credentials {
    /// Wrap an existing auth state with no key material yet
    #[must_use]
    pub fn new(creds: serde_json::Value) -> Self {
        Self {
            creds,
            keys: BTreeMap::new(),
        }
    }

    /// Synthesize fresh initial credentials for a tenant that was never paired
    #[must_use]
    pub fn fresh() -> Self {
        let mut rng = rand::thread_rng();
        let mut noise_key = [0u8; 32];
        let mut identity_key = [0u8; 32];
        rng.fill_bytes(&mut noise_key);
        rng.fill_bytes(&mut identity_key);

        Self::new(serde_json::json!({
            "registrationId": rng.next_u32() & 0x3FFF,
            "noiseKey": STANDARD.encode(noise_key),
            "identityKey": STANDARD.encode(identity_key),
            "registered": false,
            "createdAt": chrono::Utc::now().to_rfc3339(),
        }))
    }

    /// Whether the blob carries any auth state at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.creds {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Whether the pairing step has completed for these credentials
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.creds
            .get("registered")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Compact JSON encoding used for the cache mirror
    pub fn to_compact_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
