//! Opaque identifier cache

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One learned opaque identifier to external address mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierMapping {
    pub opaque_id: String,
    pub address: String,
}

/// Opaque routable identifiers resolved to stable external addresses
///
/// Entries are added opportunistically and never expire.
#[derive(Debug, Default)]
pub struct IdentifierCache {
    entries: RwLock<HashMap<String, String>>,
}

impl IdentifierCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, opaque_id: &str) -> Option<String> {
        self.entries.read().get(opaque_id).cloned()
    }

    /// Store a mapping, returning `true` when it is new or changed
    pub fn insert(&self, opaque_id: &str, address: &str) -> bool {
        if opaque_id.is_empty() || address.is_empty() {
            return false;
        }
        let mut entries = self.entries.write();
        match entries.get(opaque_id) {
            Some(existing) if existing == address => false,
            _ => {
                entries.insert(opaque_id.to_string(), address.to_string());
                true
            }
        }
    }

    /// All mappings, sorted by opaque identifier
    #[must_use]
    pub fn list(&self) -> Vec<IdentifierMapping> {
        let mut mappings: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(opaque_id, address)| IdentifierMapping {
                opaque_id: opaque_id.clone(),
                address: address.clone(),
            })
            .collect();
        mappings.sort_by(|a, b| a.opaque_id.cmp(&b.opaque_id));
        mappings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
