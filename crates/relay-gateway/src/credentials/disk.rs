//! Local-disk credential tier
//!
//! Layout per tenant: `<root>/<tenant>/creds.json` plus one
//! `<root>/<tenant>/keys/<name>.json` per key-material entry.

use async_trait::async_trait;
use relay_core::{CredentialSource, Credentials, DomainError, RepoResult, TenantId};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const CREDS_FILE: &str = "creds.json";
const KEYS_DIR: &str = "keys";

/// Credentials stored as plain files under a sessions directory
#[derive(Debug, Clone)]
pub struct LocalDiskCredentialSource {
    root: PathBuf,
}

impl LocalDiskCredentialSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Folder holding one tenant's files
    #[must_use]
    pub fn tenant_dir(&self, tenant_id: &TenantId) -> PathBuf {
        self.root.join(tenant_id.as_str())
    }
}

fn storage_error(action: &str, path: &Path, e: impl std::fmt::Display) -> DomainError {
    DomainError::StorageError(format!("{action} {}: {e}", path.display()))
}

/// Escape a key name into a safe file stem
fn encode_key_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'@' | b'.') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn decode_key_name(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Write through a temp file so readers never see a half-written file
async fn write_atomic(path: &Path, contents: &[u8]) -> RepoResult<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| storage_error("write", &tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| storage_error("rename", path, e))
}

async fn read_keys(dir: &Path) -> RepoResult<BTreeMap<String, serde_json::Value>> {
    let mut keys = BTreeMap::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
        Err(e) => return Err(storage_error("read", dir, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| storage_error("read", dir, e))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(name) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(decode_key_name)
        else {
            continue;
        };

        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| storage_error("read", &path, e))?;
        match serde_json::from_slice(&raw) {
            Ok(value) => {
                keys.insert(name, value);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping corrupt key file");
            }
        }
    }

    Ok(keys)
}

#[async_trait]
impl CredentialSource for LocalDiskCredentialSource {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn load(&self, tenant_id: &TenantId) -> RepoResult<Option<Credentials>> {
        let dir = self.tenant_dir(tenant_id);
        let creds_path = dir.join(CREDS_FILE);

        let raw = match tokio::fs::read(&creds_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("read", &creds_path, e)),
        };

        let creds: serde_json::Value = serde_json::from_slice(&raw)
            .map_err(|e| storage_error("parse", &creds_path, e))?;
        let credentials = Credentials {
            creds,
            keys: read_keys(&dir.join(KEYS_DIR)).await?,
        };

        if credentials.is_empty() {
            return Ok(None);
        }
        Ok(Some(credentials))
    }

    async fn save(&self, tenant_id: &TenantId, credentials: &Credentials) -> RepoResult<()> {
        let dir = self.tenant_dir(tenant_id);
        let keys_dir = dir.join(KEYS_DIR);
        tokio::fs::create_dir_all(&keys_dir)
            .await
            .map_err(|e| storage_error("create", &keys_dir, e))?;

        let creds = serde_json::to_vec_pretty(&credentials.creds)
            .map_err(|e| DomainError::StorageError(e.to_string()))?;
        write_atomic(&dir.join(CREDS_FILE), &creds).await?;

        let mut wanted = std::collections::HashSet::new();
        for (name, value) in &credentials.keys {
            let file = format!("{}.json", encode_key_name(name));
            let body =
                serde_json::to_vec(value).map_err(|e| DomainError::StorageError(e.to_string()))?;
            write_atomic(&keys_dir.join(&file), &body).await?;
            wanted.insert(file);
        }

        // Drop key files that are no longer part of the blob
        let mut entries = tokio::fs::read_dir(&keys_dir)
            .await
            .map_err(|e| storage_error("read", &keys_dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_error("read", &keys_dir, e))?
        {
            let file = entry.file_name().to_string_lossy().into_owned();
            if !wanted.contains(&file) {
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    tracing::warn!(file, error = %e, "Failed to remove stale key file");
                }
            }
        }

        Ok(())
    }

    async fn clear(&self, tenant_id: &TenantId) -> RepoResult<()> {
        let dir = self.tenant_dir(tenant_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &dir, e)),
        }
    }
}
