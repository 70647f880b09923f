//! Session record persistence
//!
//! The local file is the registry's durable point of truth and is rewritten
//! wholesale on every mutation. The remote registry and the cache backup are
//! mirrors that only matter when the local file is lost.

use async_trait::async_trait;
use relay_core::{DomainError, RecordSource, RepoResult, SessionRecord};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Record tier stored as a JSON array in one file
#[derive(Debug, Clone)]
pub struct LocalRecordFile {
    path: PathBuf,
}

impl LocalRecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_error(action: &str, path: &Path, e: impl std::fmt::Display) -> DomainError {
    DomainError::StorageError(format!("{action} {}: {e}", path.display()))
}

#[async_trait]
impl RecordSource for LocalRecordFile {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn load_all(&self) -> RepoResult<Vec<SessionRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error("read", &self.path, e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| storage_error("parse", &self.path, e))
    }

    async fn store_all(&self, records: &[SessionRecord]) -> RepoResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create", parent, e))?;
        }

        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| storage_error("serialize", &self.path, e))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| storage_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error("rename", &self.path, e))
    }
}

/// Where a bootstrap found its records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrigin {
    Remote,
    Cache,
    Local,
    /// Every tier was empty or unavailable
    Empty,
}

/// Ordered set of record tiers
#[derive(Clone)]
pub struct RecordStore {
    local: Arc<dyn RecordSource>,
    remote: Option<Arc<dyn RecordSource>>,
    cache: Option<Arc<dyn RecordSource>>,
}

impl RecordStore {
    #[must_use]
    pub fn new(local: Arc<dyn RecordSource>) -> Self {
        Self {
            local,
            remote: None,
            cache: None,
        }
    }

    /// Authoritative remote registry, read first at bootstrap
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RecordSource>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Cache backup, read when the remote registry has nothing
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn RecordSource>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn read_order(&self) -> Vec<(RecordOrigin, &Arc<dyn RecordSource>)> {
        let mut tiers = Vec::with_capacity(3);
        if let Some(remote) = &self.remote {
            tiers.push((RecordOrigin::Remote, remote));
        }
        if let Some(cache) = &self.cache {
            tiers.push((RecordOrigin::Cache, cache));
        }
        tiers.push((RecordOrigin::Local, &self.local));
        tiers
    }

    /// Records from the first tier returning a non-empty set
    pub async fn load_first_non_empty(&self) -> (Vec<SessionRecord>, RecordOrigin) {
        for (origin, tier) in self.read_order() {
            match tier.load_all().await {
                Ok(records) if !records.is_empty() => {
                    tracing::info!(tier = tier.name(), count = records.len(), "Session records loaded");
                    return (records, origin);
                }
                Ok(_) => tracing::debug!(tier = tier.name(), "Record tier empty"),
                Err(e) => {
                    tracing::warn!(tier = tier.name(), error = %e, "Record tier unavailable, falling through");
                }
            }
        }
        (Vec::new(), RecordOrigin::Empty)
    }

    /// Rewrite the local file, then every mirror
    ///
    /// Only the local write can fail the call.
    pub async fn store_all(&self, records: &[SessionRecord]) -> RepoResult<()> {
        self.local.store_all(records).await?;

        for tier in [&self.remote, &self.cache].into_iter().flatten() {
            if let Err(e) = tier.store_all(records).await {
                tracing::warn!(tier = tier.name(), error = %e, "Record mirror failed");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tiers: Vec<_> = self.read_order().into_iter().map(|(_, t)| t.name()).collect();
        f.debug_struct("RecordStore").field("tiers", &tiers).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryRecordSource;
    use relay_core::TenantId;

    fn record(id: &str) -> SessionRecord {
        SessionRecord::new(TenantId::parse(id).unwrap(), format!("https://x/{id}"))
    }

    #[tokio::test]
    async fn test_local_file_missing_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = LocalRecordFile::new(dir.path().join("instances.json"));
        assert!(file.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_file_rewrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let file = LocalRecordFile::new(dir.path().join("nested").join("instances.json"));

        file.store_all(&[record("T1"), record("T2")]).await.unwrap();
        file.store_all(&[record("T2")]).await.unwrap();

        let loaded = file.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].tenant_id.as_str(), "T2");
        assert!(!dir.path().join("nested").join("instances.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_local_file_corrupt_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instances.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = LocalRecordFile::new(path).load_all().await.unwrap_err();
        assert!(matches!(err, DomainError::StorageError(_)));
    }

    #[tokio::test]
    async fn test_remote_wins_over_cache_and_local() {
        let remote = Arc::new(MemoryRecordSource::named("remote"));
        let cache = Arc::new(MemoryRecordSource::named("cache"));
        let local = Arc::new(MemoryRecordSource::named("local"));
        remote.set(vec![record("R")]);
        cache.set(vec![record("C")]);
        local.set(vec![record("L")]);

        let store = RecordStore::new(local.clone())
            .with_remote(remote)
            .with_cache(cache.clone());
        let (records, origin) = store.load_first_non_empty().await;

        assert_eq!(origin, RecordOrigin::Remote);
        assert_eq!(records[0].tenant_id.as_str(), "R");
        assert_eq!(cache.loads(), 0);
        assert_eq!(local.loads(), 0);
    }

    #[tokio::test]
    async fn test_falls_through_empty_and_failing_tiers() {
        let remote = Arc::new(MemoryRecordSource::named("remote"));
        remote.set_failing(true);
        let cache = Arc::new(MemoryRecordSource::named("cache"));
        let local = Arc::new(MemoryRecordSource::named("local"));
        local.set(vec![record("L")]);

        let store = RecordStore::new(local)
            .with_remote(remote)
            .with_cache(cache.clone());
        let (records, origin) = store.load_first_non_empty().await;

        assert_eq!(origin, RecordOrigin::Local);
        assert_eq!(records.len(), 1);
        assert_eq!(cache.loads(), 1);
    }

    #[tokio::test]
    async fn test_all_empty() {
        let store = RecordStore::new(Arc::new(MemoryRecordSource::named("local")));
        let (records, origin) = store.load_first_non_empty().await;
        assert!(records.is_empty());
        assert_eq!(origin, RecordOrigin::Empty);
    }

    #[tokio::test]
    async fn test_store_all_tolerates_mirror_failure() {
        let local = Arc::new(MemoryRecordSource::named("local"));
        let cache = Arc::new(MemoryRecordSource::named("cache"));
        cache.set_failing(true);
        let store = RecordStore::new(local.clone()).with_cache(cache);

        store.store_all(&[record("T1")]).await.unwrap();
        assert_eq!(local.records().len(), 1);
    }

    #[tokio::test]
    async fn test_store_all_fails_when_local_fails() {
        let local = Arc::new(MemoryRecordSource::named("local"));
        local.set_failing(true);
        let remote = Arc::new(MemoryRecordSource::named("remote"));
        let store = RecordStore::new(local).with_remote(remote.clone());

        assert!(store.store_all(&[record("T1")]).await.is_err());
        assert_eq!(remote.stores(), 0);
    }
}
