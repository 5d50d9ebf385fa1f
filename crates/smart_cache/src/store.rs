//! File-backed cache store.
//!
//! Layout under the cache root:
//!
//! ```text
//! data/<fingerprint>.json      serialized payload
//! metadata/<fingerprint>.json  {key, timestamp, size_bytes, data_type}
//! ```
//!
//! The payload is written first and the metadata last, so a record without
//! metadata is an unfinished write and reads as a miss. Every file is written
//! to a temp name and renamed into place.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{CacheStatsSnapshot, Error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::stats::CacheStats;

const RECORD_EXT: &str = "json";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Metadata persisted next to every payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    #[serde(rename = "timestamp")]
    pub stored_at: DateTime<Utc>,
    pub size_bytes: u64,
    #[serde(rename = "data_type")]
    pub payload_type: String,
}

/// Durable key/value + metadata store with reader-supplied TTLs.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    data_dir: PathBuf,
    metadata_dir: PathBuf,
    default_ttl: Duration,
    stats: CacheStats,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, default_ttl: Duration) -> common::Result<Self> {
        Self::with_clock(dir, default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        dir: impl Into<PathBuf>,
        default_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> common::Result<Self> {
        let root = dir.into();
        let data_dir = root.join("data");
        let metadata_dir = root.join("metadata");
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&metadata_dir)?;

        info!(
            "Smart cache initialized: {} (TTL: {}min)",
            root.display(),
            default_ttl.as_secs() / 60
        );

        Ok(Self {
            root,
            data_dir,
            metadata_dir,
            default_ttl,
            stats: CacheStats::default(),
            clock,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.root
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn data_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.{RECORD_EXT}"))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.metadata_dir.join(format!("{key}.{RECORD_EXT}"))
    }

    fn is_fresh(&self, stored_at: DateTime<Utc>, ttl: Duration) -> bool {
        match (self.clock.now() - stored_at).to_std() {
            Ok(age) => age < ttl,
            // Stored "in the future" (clock skew): age is zero.
            Err(_) => true,
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────

    /// Return the payload for `key` if present and younger than `ttl`
    /// (store default when `None`). Unreadable records count as errors and
    /// read as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str, ttl: Option<Duration>) -> Option<T> {
        match self.try_get(key, ttl) {
            Ok(Some(payload)) => {
                self.stats.record_hit();
                debug!("Cache HIT: {}...", short(key));
                Some(payload)
            }
            Ok(None) => {
                self.stats.record_miss();
                debug!("Cache MISS: {}...", short(key));
                None
            }
            Err(e) => {
                self.stats.record_error();
                warn!("Cache error (get): {}", e);
                None
            }
        }
    }

    fn try_get<T: DeserializeOwned>(
        &self,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<Option<T>, Error> {
        let Some(entry) = self.read_entry(key)? else {
            return Ok(None);
        };

        if !self.is_fresh(entry.stored_at, ttl.unwrap_or(self.default_ttl)) {
            return Ok(None);
        }

        let raw = match fs::read(self.data_path(key)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(read_error(key, e)),
        };

        serde_json::from_slice(&raw).map(Some).map_err(|e| read_error(key, e))
    }

    /// Metadata for `key`, if the entry has been committed.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.read_entry(key).ok().flatten()
    }

    fn read_entry(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let raw = match fs::read(self.metadata_path(key)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(read_error(key, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| read_error(key, e))
    }

    // ── Writes ────────────────────────────────────────────────────────

    /// Persist `payload` under `key`, replacing any previous entry.
    /// Failures are counted and logged, never returned.
    pub fn set<T: Serialize>(&self, key: &str, payload: &T) {
        match self.try_set(key, payload) {
            Ok(size_bytes) => {
                self.stats.record_save();
                info!("Cache SAVE: {}... ({} bytes)", short(key), size_bytes);
            }
            Err(e) => {
                self.stats.record_error();
                warn!("Cache error (set): {}", e);
            }
        }
    }

    fn try_set<T: Serialize>(&self, key: &str, payload: &T) -> Result<u64, Error> {
        let bytes = serde_json::to_vec(payload).map_err(|e| write_error(key, e))?;
        write_atomic(&self.data_path(key), &bytes).map_err(|e| write_error(key, e))?;

        let entry = CacheEntry {
            key: key.to_string(),
            stored_at: self.clock.now(),
            size_bytes: bytes.len() as u64,
            payload_type: short_type_name::<T>(),
        };
        let meta = serde_json::to_vec_pretty(&entry).map_err(|e| write_error(key, e))?;
        write_atomic(&self.metadata_path(key), &meta).map_err(|e| write_error(key, e))?;

        Ok(entry.size_bytes)
    }

    // ── Housekeeping ──────────────────────────────────────────────────

    /// Delete every entry older than the store default TTL.
    ///
    /// This is a coarse sweep: per-read TTL overrides are not consulted, so
    /// an entry still fresh for a long-TTL reader can be removed here.
    pub fn clear_expired(&self) -> usize {
        let dir = match fs::read_dir(&self.data_dir) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Cache cleanup error: {}", e);
                return 0;
            }
        };

        let mut cleared = 0;
        for item in dir.flatten() {
            let path = item.path();
            let Some(key) = record_key(&path) else {
                continue;
            };

            let fresh = self
                .stored_at(&key, &path)
                .map(|t| self.is_fresh(t, self.default_ttl))
                .unwrap_or(false);
            if fresh {
                continue;
            }

            if let Err(e) = fs::remove_file(&path) {
                warn!("Cache cleanup error for {}: {}", path.display(), e);
                continue;
            }
            remove_if_present(&self.metadata_path(&key));
            cleared += 1;
        }
        cleared += self.clear_orphaned_metadata();

        if cleared > 0 {
            info!("Cleared {} expired cache entries", cleared);
        }
        cleared
    }

    /// Remove metadata records whose payload is gone, once they are past the
    /// default TTL.
    fn clear_orphaned_metadata(&self) -> usize {
        let dir = match fs::read_dir(&self.metadata_dir) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Cache cleanup error: {}", e);
                return 0;
            }
        };

        let mut cleared = 0;
        for item in dir.flatten() {
            let path = item.path();
            let Some(key) = record_key(&path) else {
                continue;
            };
            if self.data_path(&key).exists() {
                continue;
            }

            let stored_at = match self.read_entry(&key) {
                Ok(Some(entry)) => Some(entry.stored_at),
                _ => fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .ok()
                    .map(DateTime::<Utc>::from),
            };
            let fresh = stored_at
                .map(|t| self.is_fresh(t, self.default_ttl))
                .unwrap_or(false);
            if fresh {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed orphaned metadata {}", short(&key));
                    cleared += 1;
                }
                Err(e) => warn!("Cache cleanup error for {}: {}", path.display(), e),
            }
        }
        cleared
    }

    /// Metadata timestamp, falling back to the payload file's mtime.
    fn stored_at(&self, key: &str, data_path: &Path) -> Option<DateTime<Utc>> {
        if let Ok(Some(entry)) = self.read_entry(key) {
            return Some(entry.stored_at);
        }
        fs::metadata(data_path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    /// Remove every record from both stores and reset the counters.
    /// Returns the number of files removed.
    pub fn clear_all(&self) -> common::Result<u64> {
        let mut removed = 0u64;
        for dir in [&self.data_dir, &self.metadata_dir] {
            if !dir.exists() {
                continue;
            }
            for item in fs::read_dir(dir)? {
                let path = item?.path();
                if path.is_file() {
                    fs::remove_file(&path)?;
                    removed += 1;
                }
            }
        }

        self.stats.reset();
        info!("Cache cleared: removed {} files", removed);
        Ok(removed)
    }

    // ── Reporting ─────────────────────────────────────────────────────

    /// Counters plus a fresh scan of on-disk usage.
    pub fn stats(&self) -> CacheStatsSnapshot {
        let counters = self.stats.values();
        let total_requests = counters.hits + counters.misses;
        let hit_rate = if total_requests > 0 {
            counters.hits as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };

        let (cache_files, cache_size_bytes) = self.scan_usage();

        CacheStatsSnapshot {
            hit_rate_percent: round_to(hit_rate, 1),
            total_requests,
            cache_files,
            cache_size_bytes,
            cache_size_mb: round_to(cache_size_bytes as f64 / 1024.0 / 1024.0, 2),
            hits: counters.hits,
            misses: counters.misses,
            saves: counters.saves,
            errors: counters.errors,
        }
    }

    fn scan_usage(&self) -> (u64, u64) {
        let Ok(dir) = fs::read_dir(&self.data_dir) else {
            return (0, 0);
        };

        dir.flatten()
            .filter(|item| record_key(&item.path()).is_some())
            .filter_map(|item| item.metadata().ok())
            .fold((0, 0), |(files, bytes), meta| (files + 1, bytes + meta.len()))
    }

    /// Both record directories exist.
    pub fn is_healthy(&self) -> bool {
        self.data_dir.is_dir() && self.metadata_dir.is_dir()
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

fn short(key: &str) -> &str {
    &key[..key.len().min(8)]
}

fn read_error(key: &str, e: impl std::fmt::Display) -> Error {
    Error::CacheRead {
        key: key.to_string(),
        reason: e.to_string(),
    }
}

fn write_error(key: &str, e: impl std::fmt::Display) -> Error {
    Error::CacheWrite {
        key: key.to_string(),
        reason: e.to_string(),
    }
}

/// Fingerprint of a committed record file; temp files and strays yield `None`.
fn record_key(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with('.') {
        return None;
    }
    Some(stem.to_string())
}

fn remove_if_present(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "record path has no parent"))?;
    let tmp = parent.join(format!(
        ".{}.tmp.{}.{}",
        path.file_name().and_then(|s| s.to_str()).unwrap_or("record"),
        std::process::id(),
        TMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    // Strip module paths but keep generic arguments readable.
    let base = full.split('<').next().unwrap_or(full);
    let short_base = base.rsplit("::").next().unwrap_or(base);
    match full.find('<') {
        Some(idx) => format!("{}{}", short_base, &full[idx..]),
        None => short_base.to_string(),
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::BTreeMap;

    const MINUTE: Duration = Duration::from_secs(60);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    fn store_with_clock(default_minutes: u64) -> (tempfile::TempDir, CacheStore, Arc<ManualClock>) {
        let tmp = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let store =
            CacheStore::with_clock(tmp.path(), MINUTE * default_minutes as u32, clock.clone())
                .unwrap();
        (tmp, store, clock)
    }

    #[test]
    fn test_open_creates_layout() {
        let (tmp, store, _) = store_with_clock(30);
        assert!(tmp.path().join("data").is_dir());
        assert!(tmp.path().join("metadata").is_dir());
        assert!(store.is_healthy());
    }

    #[test]
    fn test_round_trip_scalar_map_and_sequence() {
        let (_tmp, store, _) = store_with_clock(30);

        store.set("scalar", &(0.1f64 + 0.2));
        assert_eq!(store.get::<f64>("scalar", None), Some(0.1 + 0.2));

        let risks = vec![0.44791832676481635f64, 0.46088735902818484, 0.46085986260173245];
        store.set("risks", &risks);
        let read = store.get::<Vec<f64>>("risks", None).unwrap();
        assert_eq!(
            read.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            risks.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );

        let mut nested = BTreeMap::new();
        nested.insert("modis".to_string(), json!({"lst_day_mean": 31.2, "count": [1, 2]}));
        store.set("nested", &nested);
        assert_eq!(
            store.get::<BTreeMap<String, serde_json::Value>>("nested", None),
            Some(nested)
        );

        let seq = vec!["Today".to_string(), "Tomorrow".to_string()];
        store.set("seq", &seq);
        assert_eq!(store.get::<Vec<String>>("seq", None), Some(seq));
    }

    #[test]
    fn test_set_writes_metadata() {
        let (tmp, store, _) = store_with_clock(30);
        store.set("abc123", &vec![1u32, 2, 3]);

        let entry = store.entry("abc123").expect("metadata written");
        assert_eq!(entry.key, "abc123");
        assert_eq!(entry.stored_at, t0());
        assert_eq!(entry.size_bytes, "[1,2,3]".len() as u64);
        assert_eq!(entry.payload_type, "Vec<u32>");

        let raw = fs::read_to_string(tmp.path().join("metadata/abc123.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("timestamp").is_some());
        assert!(value.get("data_type").is_some());
    }

    #[test]
    fn test_ttl_boundary() {
        let (_tmp, store, clock) = store_with_clock(30);
        store.set("k", &"payload");

        let ttl = Some(MINUTE * 30);
        clock.advance(chrono::Duration::minutes(30) - chrono::Duration::seconds(1));
        assert_eq!(store.get::<String>("k", ttl).as_deref(), Some("payload"));

        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(store.get::<String>("k", ttl), None);
    }

    #[test]
    fn test_reader_ttl_overrides_default() {
        let (_tmp, store, clock) = store_with_clock(30);
        store.set("k", &1u8);
        clock.advance(chrono::Duration::minutes(45));

        assert_eq!(store.get::<u8>("k", None), None);
        assert_eq!(store.get::<u8>("k", Some(MINUTE * 60)), Some(1));
    }

    #[test]
    fn test_stats_accounting() {
        let (_tmp, store, _) = store_with_clock(30);
        let empty = store.stats();
        assert_eq!(empty.hit_rate_percent, 0.0);
        assert_eq!(empty.total_requests, 0);

        store.set("a", &1u8);
        for _ in 0..2 {
            assert!(store.get::<u8>("a", None).is_some());
        }
        assert!(store.get::<u8>("missing", None).is_none());

        let stats = store.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.saves, 1);
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.hit_rate_percent, 66.7);
        assert_eq!(stats.cache_files, 1);
        assert_eq!(stats.cache_size_bytes, 1);
    }

    #[test]
    fn test_corrupt_record_counts_error_and_misses_quietly() {
        let (tmp, store, _) = store_with_clock(30);
        store.set("bad", &vec![1, 2, 3]);
        fs::write(tmp.path().join("data/bad.json"), b"{not json").unwrap();

        assert_eq!(store.get::<Vec<i32>>("bad", None), None);
        let stats = store.stats();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_type_mismatch_is_read_error() {
        let (_tmp, store, _) = store_with_clock(30);
        store.set("k", &"text");
        assert_eq!(store.get::<Vec<u8>>("k", None), None);
        assert_eq!(store.stats().errors, 1);
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let (tmp, store, _) = store_with_clock(30);
        fs::remove_dir_all(tmp.path().join("data")).unwrap();
        fs::write(tmp.path().join("data"), b"not a directory").unwrap();

        store.set("k", &1u8);

        let stats = store.stats();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.saves, 0);
        assert_eq!(store.get::<u8>("k", None), None);
    }

    #[test]
    fn test_payload_without_metadata_is_a_miss() {
        let (tmp, store, _) = store_with_clock(30);
        fs::write(tmp.path().join("data/orphan.json"), b"1").unwrap();

        assert_eq!(store.get::<u8>("orphan", None), None);
        assert_eq!(store.stats().errors, 0);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_clear_expired_uses_default_ttl_only() {
        let (tmp, store, clock) = store_with_clock(30);
        store.set("long_lived", &"forecast");
        store.set("other", &"risk");

        clock.advance(chrono::Duration::minutes(31));
        // Still fresh for a 120-minute reader...
        assert!(store.get::<String>("long_lived", Some(MINUTE * 120)).is_some());
        // ...but the sweep only knows the 30-minute default.
        assert_eq!(store.clear_expired(), 2);
        assert!(!tmp.path().join("data/long_lived.json").exists());
        assert!(!tmp.path().join("metadata/long_lived.json").exists());
        assert!(store.get::<String>("long_lived", Some(MINUTE * 120)).is_none());
    }

    #[test]
    fn test_clear_expired_keeps_fresh_entries() {
        let (_tmp, store, clock) = store_with_clock(30);
        store.set("old", &1u8);
        clock.advance(chrono::Duration::minutes(40));
        store.set("new", &2u8);

        assert_eq!(store.clear_expired(), 1);
        assert_eq!(store.get::<u8>("new", None), Some(2));
        assert_eq!(store.stats().cache_files, 1);
    }

    #[test]
    fn test_clear_all_removes_files_and_resets_counters() {
        let (_tmp, store, _) = store_with_clock(30);
        store.set("a", &1u8);
        store.set("b", &2u8);
        store.get::<u8>("a", None);

        assert_eq!(store.clear_all().unwrap(), 4);
        let stats = store.stats();
        assert_eq!(stats.cache_files, 0);
        assert_eq!(stats.hits + stats.misses + stats.saves + stats.errors, 0);
    }

    #[test]
    fn test_overwrite_replaces_payload() {
        let (_tmp, store, clock) = store_with_clock(30);
        store.set("k", &1u8);
        clock.advance(chrono::Duration::minutes(10));
        store.set("k", &2u8);

        assert_eq!(store.get::<u8>("k", None), Some(2));
        assert_eq!(
            store.entry("k").unwrap().stored_at,
            t0() + chrono::Duration::minutes(10)
        );
        assert_eq!(store.stats().cache_files, 1);
    }

    #[test]
    fn test_clear_expired_removes_orphaned_metadata() {
        let (tmp, store, clock) = store_with_clock(30);
        store.set("lost", &1u8);
        store.set("kept", &2u8);
        fs::remove_file(tmp.path().join("data/lost.json")).unwrap();

        // Orphans inside the default TTL are left alone.
        assert_eq!(store.clear_expired(), 0);
        assert!(tmp.path().join("metadata/lost.json").exists());

        clock.advance(chrono::Duration::minutes(31));
        assert_eq!(store.clear_expired(), 2);
        assert!(!tmp.path().join("metadata/lost.json").exists());
        assert!(!tmp.path().join("metadata/kept.json").exists());
        assert_eq!(fs::read_dir(tmp.path().join("metadata")).unwrap().count(), 0);
    }

    #[test]
    fn test_concurrent_writers_leave_one_intact_payload() {
        let (tmp, store, _) = store_with_clock(30);

        std::thread::scope(|s| {
            for writer in 0..8u32 {
                let store = &store;
                s.spawn(move || {
                    for _ in 0..25 {
                        store.set("shared", &vec![writer; 64]);
                    }
                });
            }
        });

        let payload = store.get::<Vec<u32>>("shared", None).expect("payload intact");
        assert_eq!(payload.len(), 64);
        assert!(payload.iter().all(|v| *v == payload[0]));
        assert_eq!(store.stats().errors, 0);
        assert_eq!(store.stats().saves, 200);

        for sub in ["data", "metadata"] {
            let leftovers: Vec<_> = fs::read_dir(tmp.path().join(sub))
                .unwrap()
                .flatten()
                .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
                .collect();
            assert!(leftovers.is_empty(), "temp files left in {sub}: {leftovers:?}");
        }
    }
}
