//! # Response Cache
//!
//! Persistent store of prior HTTP responses keyed by request identity.
//!
//! Each cache root is one sled database shared by the whole process; each API
//! gets its own tree (partition) named after its lower-cased `api_name`, so
//! every client instance for the same API reads and writes the same entries.
//! Entries expire after a TTL (30 days by default) and every hit on a live
//! entry pushes its expiry forward again.

use super::{Repository, RepositoryError, RepositoryResult, RepositoryStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Default time-to-live for cached responses (30 days)
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// A stored response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Raw body bytes
    pub body: Vec<u8>,
    /// When the response was first stored
    pub stored_at: DateTime<Utc>,
    /// When the entry stops being served
    pub expires_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Check if this entry has expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Hit/miss counters for one cache handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,
    /// Total number of cache misses
    pub misses: u64,
    /// Total number of entries expired and removed
    pub expirations: u64,
    /// Total number of responses written
    pub stores: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    stores: AtomicU64,
}

/// Handle on one API's cache partition
#[derive(Debug)]
pub struct ResponseCache {
    partition: String,
    db: sled::Db,
    tree: sled::Tree,
    ttl: chrono::Duration,
    counters: Counters,
}

impl ResponseCache {
    /// Open (or create) the partition for `api_name` under `root`
    pub fn open(root: &Path, api_name: &str, ttl: Duration) -> RepositoryResult<Self> {
        let partition = api_name.to_lowercase();
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| RepositoryError::Storage {
            message: format!("TTL out of range: {e}"),
        })?;

        let db = shared_db(root)?;
        let tree = db.open_tree(partition.as_bytes())?;

        debug!(
            "Opened response cache partition '{}' at {}",
            partition,
            root.display()
        );

        Ok(Self {
            partition,
            db,
            tree,
            ttl,
            counters: Counters::default(),
        })
    }

    /// List the partitions present under `root`
    pub fn partitions(root: &Path) -> RepositoryResult<Vec<String>> {
        let db = shared_db(root)?;
        Ok(db
            .tree_names()
            .into_iter()
            .filter(|name| &name[..] != b"__sled__default".as_slice())
            .map(|name| String::from_utf8_lossy(&name).into_owned())
            .collect())
    }

    /// Fingerprint a request: method, full URL, `Accept` header and body
    #[must_use]
    pub fn request_key(method: &str, url: &str, accept: &str, body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(method.to_ascii_uppercase().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
        hasher.update(accept.as_bytes());
        hasher.update(b"\n");
        hasher.update(body);
        let digest = hasher.finalize();
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    /// Get a live entry, sliding its expiry forward.
    ///
    /// Expired entries are removed and reported as a miss.
    pub fn lookup(&self, key: &str) -> RepositoryResult<Option<CachedResponse>> {
        let Some(raw) = self.tree.get(key.as_bytes())? else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache miss in '{}'", self.partition);
            return Ok(None);
        };

        let mut entry: CachedResponse = bincode::deserialize(&raw)?;
        if entry.is_expired() {
            self.tree.remove(key.as_bytes())?;
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache entry expired in '{}'", self.partition);
            return Ok(None);
        }

        entry.expires_at = Utc::now() + self.ttl;
        self.tree
            .insert(key.as_bytes(), bincode::serialize(&entry)?)?;
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        debug!("Cache hit in '{}'", self.partition);
        Ok(Some(entry))
    }

    /// Store a response under `key` with a fresh TTL
    pub fn store(
        &self,
        key: &str,
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    ) -> RepositoryResult<()> {
        let now = Utc::now();
        let entry = CachedResponse {
            status,
            content_type,
            body,
            stored_at: now,
            expires_at: now + self.ttl,
        };
        self.tree
            .insert(key.as_bytes(), bincode::serialize(&entry)?)?;
        self.counters.stores.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> RepositoryResult<u64> {
        let mut removed = 0;
        for item in self.tree.iter() {
            let (key, raw) = item?;
            let entry: CachedResponse = bincode::deserialize(&raw)?;
            if entry.is_expired() {
                self.tree.remove(key)?;
                removed += 1;
            }
        }
        self.counters
            .expirations
            .fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    /// Persist pending writes
    pub fn flush(&self) -> RepositoryResult<()> {
        self.tree.flush()?;
        Ok(())
    }

    /// Counters for this handle
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            stores: self.counters.stores.load(Ordering::Relaxed),
        }
    }

    /// Partition name (lower-cased api name)
    #[must_use]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Number of stored entries, live or expired
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the partition holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl Repository for ResponseCache {
    fn name(&self) -> &str {
        &self.partition
    }

    fn clear(&self) -> RepositoryResult<()> {
        self.tree.clear()?;
        info!("Cleared response cache partition '{}'", self.partition);
        Ok(())
    }

    fn stats(&self) -> RepositoryResult<RepositoryStats> {
        Ok(RepositoryStats {
            total_entities: self.tree.len() as u64,
            storage_size_bytes: Some(self.db.size_on_disk()?),
        })
    }
}

/// Databases opened by this process, keyed by cache root.
///
/// sled locks its directory, so a second `sled::open` on the same root would
/// fail; every handle for a root shares one `Db`.
fn shared_db(root: &Path) -> RepositoryResult<sled::Db> {
    static DATABASES: OnceLock<Mutex<HashMap<PathBuf, sled::Db>>> = OnceLock::new();

    let mut databases = DATABASES
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(db) = databases.get(root) {
        return Ok(db.clone());
    }

    std::fs::create_dir_all(root)?;
    let db = sled::open(root)?;
    databases.insert(root.to_path_buf(), db.clone());
    info!("Opened response cache database at {}", root.display());
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_and_lookup() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::open(dir.path(), "UniProt", DEFAULT_TTL).unwrap();
        assert_eq!(cache.partition(), "uniprot");

        let key = ResponseCache::request_key("GET", "https://x.org/a", "application/json", b"");
        assert!(cache.lookup(&key).unwrap().is_none());

        cache
            .store(&key, 200, Some("application/json".into()), b"{}".to_vec())
            .unwrap();
        let entry = cache.lookup(&key).unwrap().unwrap();
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body, b"{}");

        let stats = cache.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.stores, 1);
    }

    #[test]
    fn test_hit_slides_expiry() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::open(dir.path(), "kegg", Duration::from_secs(3600)).unwrap();
        let key = ResponseCache::request_key("GET", "https://x.org/b", "*/*", b"");
        cache.store(&key, 200, None, b"text".to_vec()).unwrap();

        let first = cache.lookup(&key).unwrap().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let second = cache.lookup(&key).unwrap().unwrap();
        assert!(second.expires_at > first.expires_at);
        assert_eq!(second.stored_at, first.stored_at);
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::open(dir.path(), "reactome", Duration::ZERO).unwrap();
        let key = ResponseCache::request_key("GET", "https://x.org/c", "*/*", b"");
        cache.store(&key, 200, None, b"stale".to_vec()).unwrap();

        assert!(cache.lookup(&key).unwrap().is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.cache_stats().expirations, 1);
    }

    #[test]
    fn test_partitions_are_shared_and_separate() {
        let dir = TempDir::new().unwrap();
        let first = ResponseCache::open(dir.path(), "ChEMBL", DEFAULT_TTL).unwrap();
        let second = ResponseCache::open(dir.path(), "chembl", DEFAULT_TTL).unwrap();
        let other = ResponseCache::open(dir.path(), "MyGene", DEFAULT_TTL).unwrap();

        let key = ResponseCache::request_key("GET", "https://x.org/d", "*/*", b"");
        first.store(&key, 200, None, b"shared".to_vec()).unwrap();

        assert!(second.lookup(&key).unwrap().is_some());
        assert!(other.lookup(&key).unwrap().is_none());

        let mut partitions = ResponseCache::partitions(dir.path()).unwrap();
        partitions.sort();
        assert_eq!(partitions, vec!["chembl".to_string(), "mygene".to_string()]);
    }

    #[test]
    fn test_request_key_distinguishes_requests() {
        let get = ResponseCache::request_key("GET", "https://x.org/e?q=1", "*/*", b"");
        let get_lower = ResponseCache::request_key("get", "https://x.org/e?q=1", "*/*", b"");
        let other_query = ResponseCache::request_key("GET", "https://x.org/e?q=2", "*/*", b"");
        let post = ResponseCache::request_key("POST", "https://x.org/e?q=1", "*/*", b"a=1");

        assert_eq!(get, get_lower);
        assert_ne!(get, other_query);
        assert_ne!(get, post);
        assert_eq!(get.len(), 64);
    }

    #[test]
    fn test_clear_and_stats() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::open(dir.path(), "gwas", DEFAULT_TTL).unwrap();
        for i in 0..3 {
            let key = ResponseCache::request_key("GET", &format!("https://x.org/{i}"), "*/*", b"");
            cache.store(&key, 200, None, vec![b'x'; 16]).unwrap();
        }
        assert_eq!(cache.stats().unwrap().total_entities, 3);

        cache.clear().unwrap();
        assert_eq!(cache.stats().unwrap().total_entities, 0);
    }

    #[test]
    fn test_purge_expired() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::open(dir.path(), "omim", Duration::ZERO).unwrap();
        for i in 0..2 {
            let key = ResponseCache::request_key("GET", &format!("https://x.org/{i}"), "*/*", b"");
            cache.store(&key, 200, None, Vec::new()).unwrap();
        }
        assert_eq!(cache.purge_expired().unwrap(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            expirations: 0,
            stores: 1,
        };
        assert!((stats.hit_rate() - 75.0).abs() < f64::EPSILON);
        assert!(CacheStats::default().hit_rate().abs() < f64::EPSILON);
    }
}
