//! Durable cache tier.
//!
//! The durable store outlives the process: entries written before a restart
//! are served afterwards until they expire. Stores may physically remove
//! expired rows on their own schedule ([`DurableStore::sweep_expired`]), but
//! readers never rely on that and re-check `expires_at` themselves.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::IntoEnumIterator;
use uuid::Uuid;

use super::{CacheEntry, CacheKey};
use crate::error::{GatewayError, Result};
use crate::types::{Domain, SearchPayload};

const RECORD_VERSION: u32 = 1;

/// Storage abstraction for the durable cache tier.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Load the record for `key`. May return an expired entry.
    async fn get(&self, domain: Domain, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Insert or replace the record for `entry.key`.
    async fn put(&self, entry: &CacheEntry) -> Result<()>;

    async fn remove(&self, domain: Domain, key: &CacheKey) -> Result<bool>;

    /// Physically delete records with `expires_at <= now`.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Delete every record of `domain`, or of all domains.
    async fn clear(&self, domain: Option<Domain>) -> Result<usize>;
}

/// Persisted shape of one cache record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    version: u32,
    key: CacheKey,
    domain: Domain,
    data: Vec<Value>,
    meta: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dictionaries: Option<Value>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredRecord {
    fn from_entry(entry: &CacheEntry, updated_at: DateTime<Utc>) -> Self {
        Self {
            version: RECORD_VERSION,
            key: entry.key.clone(),
            domain: entry.domain,
            data: entry.payload.data.clone(),
            meta: entry.payload.meta.clone(),
            dictionaries: entry.payload.dictionaries.clone(),
            expires_at: entry.expires_at,
            created_at: entry.created_at,
            updated_at,
        }
    }

    fn into_entry(self) -> CacheEntry {
        CacheEntry {
            key: self.key,
            domain: self.domain,
            payload: SearchPayload {
                data: self.data,
                meta: self.meta,
                dictionaries: self.dictionaries,
            },
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// Durable tier kept in process memory.
///
/// Survives nothing, but honours the same contract as the file store; useful
/// for tests and for deployments that only want request deduplication plus a
/// short-lived cache.
#[derive(Debug, Default)]
pub struct InMemoryDurableStore {
    records: Mutex<HashMap<(Domain, CacheKey), StoredRecord>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(Domain, CacheKey), StoredRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a record directly, without counting it as a write.
    pub fn seed(&self, entry: &CacheEntry) {
        self.lock().insert(
            (entry.domain, entry.key.clone()),
            StoredRecord::from_entry(entry, entry.created_at),
        );
    }

    /// Number of `get` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `put` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn get(&self, domain: Domain, key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .lock()
            .get(&(domain, key.clone()))
            .cloned()
            .map(StoredRecord::into_entry))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(
            (entry.domain, entry.key.clone()),
            StoredRecord::from_entry(entry, Utc::now()),
        );
        Ok(())
    }

    async fn remove(&self, domain: Domain, key: &CacheKey) -> Result<bool> {
        Ok(self.lock().remove(&(domain, key.clone())).is_some())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, record| record.expires_at > now);
        Ok(before - records.len())
    }

    async fn clear(&self, domain: Option<Domain>) -> Result<usize> {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|(record_domain, _), _| domain.is_some_and(|d| d != *record_domain));
        Ok(before - records.len())
    }
}

/// File-backed durable tier: one JSON document per key under
/// `<base_dir>/<domain>/<sha256(key)>.json`.
///
/// Writes go to a temporary file that is then renamed over the target, so a
/// reader sees either the previous record or the new one, never a partial
/// write.
#[derive(Debug, Clone)]
pub struct FileDurableStore {
    base_dir: PathBuf,
}

impl FileDurableStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Store rooted at the default cache directory (`~/.tripgate/cache`).
    pub fn new_default() -> Self {
        Self::new(Self::default_dir())
    }

    pub fn default_dir() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".tripgate"))
            .unwrap_or_else(|| PathBuf::from(".tripgate"))
            .join("cache")
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn domain_dir(&self, domain: Domain) -> PathBuf {
        self.base_dir.join(domain.as_str())
    }

    fn record_path(&self, domain: Domain, key: &CacheKey) -> PathBuf {
        self.domain_dir(domain).join(format!("{}.json", key.digest()))
    }

    async fn read_record(path: &Path) -> Result<Option<StoredRecord>> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: StoredRecord = serde_json::from_slice(&raw)?;
        if record.version != RECORD_VERSION {
            return Err(GatewayError::Storage(format!(
                "Unsupported cache record version {} at {}",
                record.version,
                path.display()
            )));
        }
        Ok(Some(record))
    }

    async fn remove_file(path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Record files of `domain`; a missing directory has none.
    async fn record_files(&self, domain: Domain) -> Result<Vec<PathBuf>> {
        let mut dir = match tokio::fs::read_dir(self.domain_dir(domain)).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut files = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl DurableStore for FileDurableStore {
    async fn get(&self, domain: Domain, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.record_path(domain, key);
        Ok(Self::read_record(&path)
            .await?
            .filter(|record| record.key == *key)
            .map(StoredRecord::into_entry))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let path = self.record_path(entry.domain, &entry.key);
        let record = StoredRecord::from_entry(entry, Utc::now());
        let serialized = serde_json::to_vec(&record)?;
        atomic_write(&path, &serialized).await
    }

    async fn remove(&self, domain: Domain, key: &CacheKey) -> Result<bool> {
        Self::remove_file(&self.record_path(domain, key)).await
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for domain in Domain::iter() {
            for path in self.record_files(domain).await? {
                let stale = match Self::read_record(&path).await {
                    Ok(Some(record)) => record.expires_at <= now,
                    Ok(None) => false,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "Dropping unreadable cache record");
                        true
                    }
                };
                if stale && Self::remove_file(&path).await? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn clear(&self, domain: Option<Domain>) -> Result<usize> {
        let domains: Vec<Domain> = match domain {
            Some(domain) => vec![domain],
            None => Domain::iter().collect(),
        };
        let mut removed = 0;
        for domain in domains {
            for path in self.record_files(domain).await? {
                if Self::remove_file(&path).await? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

async fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        GatewayError::Storage(format!("Cache path {} has no file name", path.display()))
    })?;
    let temp_path = path.with_file_name(format!(
        ".{}.tmp-{}",
        file_name.to_string_lossy(),
        Uuid::new_v4()
    ));

    if let Err(err) = tokio::fs::write(&temp_path, data).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(err.into());
    }

    if let Err(err) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(err.into());
    }

    Ok(())
}
