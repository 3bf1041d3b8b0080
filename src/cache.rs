//! Report cache: fingerprint → `ReportModel` with an absolute TTL (15 minutes by
//! default, no sliding refresh).
//!
//! The cache is best-effort. Writes never fail outward, unreadable entries read as
//! absent, and expired entries are removed lazily on `get`. The backing store is a
//! plain string key/value [`CacheStore`] so the same cache runs on memory or on a
//! directory of JSON files.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::query::QueryMode;
use crate::report::ReportModel;

pub const CACHE_PREFIX: &str = "egr_cache_";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Deterministic cache key for (expression, window, mode). The mode tag keeps a
/// free-text and a vocabulary run with the same string apart.
pub fn fingerprint(expression: &str, window_days: u32, mode: QueryMode) -> String {
    let mut hasher = Sha256::new();
    hasher.update(expression.as_bytes());
    hasher.update(b"|");
    hasher.update(window_days.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(mode.tag().as_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(CACHE_PREFIX.len() + 32);
    out.push_str(CACHE_PREFIX);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

// ------------------------------------------------------------
// Backing stores
// ------------------------------------------------------------

/// String key/value storage with the semantics of browser local storage.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// In-process store. An optional capacity makes `set` fail once full, like a quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            capacity: Some(capacity),
        }
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut map = self.inner.write();
        if let Some(cap) = self.capacity {
            if !map.contains_key(key) && map.len() >= cap {
                return Err(io::Error::new(io::ErrorKind::Other, "store full"));
            }
        }
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.inner.write().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }
}

/// One `<key>.json` file per entry; writes go through a temp file + rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let _ = fs::create_dir_all(&dir); // best-effort
        Self { dir }
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        // keys become file names; refuse anything that could escape the directory
        let safe = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        safe.then(|| self.dir.join(format!("{key}.json")))
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)?).ok()
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self
            .path_for(key)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid cache key"))?;
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)?;
        f.write_all(value.as_bytes())?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    fn remove(&self, key: &str) {
        if let Some(p) = self.path_for(key) {
            let _ = fs::remove_file(p);
        }
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().into_string().ok()?;
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect()
    }
}

// ------------------------------------------------------------
// Report cache
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub fingerprint: String,
    /// UNIX milliseconds.
    pub created_at: i64,
    pub payload: ReportModel,
}

/// A serialized entry ready for [`ReportCache::commit`].
#[derive(Debug, Clone)]
pub struct EncodedEntry {
    key: String,
    json: String,
}

pub struct ReportCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ReportCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn is_expired(&self, created_at: i64) -> bool {
        let age_ms = self.clock.now_ms().saturating_sub(created_at);
        age_ms > self.ttl.as_millis() as i64
    }

    pub fn get(&self, fingerprint: &str) -> Option<ReportModel> {
        let Some(raw) = self.store.get(fingerprint) else {
            counter!("radar_cache_misses_total").increment(1);
            return None;
        };
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "unreadable cache entry");
                counter!("radar_cache_misses_total").increment(1);
                return None;
            }
        };
        if self.is_expired(entry.created_at) {
            self.store.remove(fingerprint);
            counter!("radar_cache_misses_total").increment(1);
            return None;
        }
        counter!("radar_cache_hits_total").increment(1);
        Some(entry.payload)
    }

    pub fn set(&self, fingerprint: &str, report: &ReportModel) {
        if let Some(entry) = self.encode(fingerprint, report) {
            self.commit(&entry);
        }
    }

    /// Serialize an entry stamped with the current time, without touching the store.
    pub fn encode(&self, fingerprint: &str, report: &ReportModel) -> Option<EncodedEntry> {
        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            created_at: self.clock.now_ms(),
            payload: report.clone(),
        };
        match serde_json::to_string(&entry) {
            Ok(json) => Some(EncodedEntry {
                key: entry.fingerprint,
                json,
            }),
            Err(e) => {
                debug!(error = %e, "cache entry not serializable");
                None
            }
        }
    }

    /// Write a previously encoded entry. Failures are logged and swallowed.
    pub fn commit(&self, entry: &EncodedEntry) {
        if let Err(e) = self.store.set(&entry.key, &entry.json) {
            debug!(error = %e, "cache write skipped");
        }
    }

    /// Remove every cache entry (other keys in the store are left alone).
    pub fn clear(&self) -> usize {
        let keys: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(CACHE_PREFIX))
            .collect();
        for k in &keys {
            self.store.remove(k);
        }
        keys.len()
    }

    /// Number of entries that have not expired yet.
    pub fn count(&self) -> usize {
        self.store
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(CACHE_PREFIX))
            .filter_map(|k| self.store.get(&k))
            .filter_map(|raw| serde_json::from_str::<CacheEntryHeader>(&raw).ok())
            .filter(|h| !self.is_expired(h.created_at))
            .count()
    }
}

/// Just the timestamp, so `count` does not parse whole reports.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntryHeader {
    created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_mode_sensitive() {
        let a = fingerprint("(diabetes) AND (metformin)", 365, QueryMode::FreeText);
        let b = fingerprint("(diabetes) AND (metformin)", 365, QueryMode::FreeText);
        let c = fingerprint("(diabetes) AND (metformin)", 365, QueryMode::Vocabulary);
        let d = fingerprint("(diabetes) AND (metformin)", 730, QueryMode::FreeText);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert!(a.starts_with(CACHE_PREFIX));
        assert_eq!(a.len(), CACHE_PREFIX.len() + 32);
    }

    #[test]
    fn memory_store_with_capacity_rejects_new_keys() {
        let s = MemoryStore::with_capacity(1);
        s.set("a", "1").unwrap();
        assert!(s.set("b", "2").is_err());
        // overwrite of an existing key still works
        s.set("a", "3").unwrap();
        assert_eq!(s.get("a").as_deref(), Some("3"));
    }

    #[test]
    fn file_store_round_trips_and_lists_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let s = FileStore::new(tmp.path().join("cache"));
        s.set("egr_cache_abc", "{}").unwrap();
        assert_eq!(s.get("egr_cache_abc").as_deref(), Some("{}"));
        assert_eq!(s.keys(), vec!["egr_cache_abc".to_string()]);
        s.remove("egr_cache_abc");
        assert!(s.get("egr_cache_abc").is_none());
    }

    #[test]
    fn file_store_refuses_path_like_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let s = FileStore::new(tmp.path());
        assert!(s.set("../escape", "{}").is_err());
        assert!(s.get("../escape").is_none());
    }
}
