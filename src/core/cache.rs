// src/core/cache.rs
//! Fingerprint cache for assembled context bundles.
//!
//! Entries are keyed by a hash of the sorted file set and validated lazily on
//! `get`: an entry is served only while it is younger than the configured max
//! age and every file still has the mtime, size and content length recorded
//! when the entry was stored. Any other outcome evicts the whole entry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{PatchwrightError, Result};
use super::bundle::ProjectContextBundle;

const SNAPSHOT_VERSION: u32 = 1;
const KEY_DELIMITER: &str = "\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Canonical (sorted, deduplicated) file set the key was derived from
    pub files: Vec<PathBuf>,
    pub staleness_hash: String,
    pub bundle: ProjectContextBundle,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: usize,
    pub approx_byte_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheSnapshot {
    version: u32,
    exported_at: DateTime<Utc>,
    stats: CacheCounters,
    entries: Vec<CacheEntry>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    counters: CacheCounters,
}

/// Content-fingerprint cache; all state sits behind one mutex so each
/// check-then-evict sequence is atomic.
pub struct ContentFingerprintCache {
    max_age: Duration,
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl ContentFingerprintCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(
            Duration::seconds(config.max_age_secs.min(i64::MAX as u64 / 1_000) as i64),
            config.max_entries,
        )
    }

    pub fn with_limits(max_age: Duration, max_entries: usize) -> Self {
        Self {
            max_age,
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up the bundle for a file set, evicting the entry if it is stale
    pub fn get(&self, files: &[PathBuf]) -> Option<ProjectContextBundle> {
        let files = canonical_file_set(files);
        let key = fingerprint(&files);
        let mut state = self.lock();

        let Some(entry) = state.entries.get(&key) else {
            state.counters.misses += 1;
            debug!("Cache miss for {}", short(&key));
            return None;
        };

        let expired = Utc::now() - entry.created_at >= self.max_age;
        let current_hash = staleness_hash(&entry.files);
        let stale = current_hash.as_deref() != Some(entry.staleness_hash.as_str());

        if expired || stale {
            debug!(
                "Evicting cache entry {} (expired: {}, stale: {})",
                short(&key),
                expired,
                stale
            );
            state.entries.remove(&key);
            state.counters.misses += 1;
            return None;
        }

        let bundle = entry.bundle.clone();
        state.counters.hits += 1;
        debug!("Cache hit for {}", short(&key));
        Some(bundle)
    }

    /// Store a bundle for a file set. File sets whose files cannot all be
    /// read are not stored, since they could never validate.
    pub fn set(&self, files: &[PathBuf], bundle: ProjectContextBundle) {
        let files = canonical_file_set(files);
        let key = fingerprint(&files);

        let Some(staleness_hash) = staleness_hash(&files) else {
            debug!("Not caching {}: some files are missing or unreadable", short(&key));
            return;
        };

        let mut state = self.lock();
        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
            let oldest = state
                .entries
                .values()
                .min_by_key(|entry| entry.created_at)
                .map(|entry| entry.key.clone());
            if let Some(oldest) = oldest {
                debug!("Cache full, evicting oldest entry {}", short(&oldest));
                state.entries.remove(&oldest);
            }
        }

        state.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                files,
                staleness_hash,
                bundle,
                created_at: Utc::now(),
            },
        );
    }

    /// Drop the entry for a file set; returns whether one existed
    pub fn invalidate(&self, files: &[PathBuf]) -> bool {
        let key = fingerprint(&canonical_file_set(files));
        self.lock().entries.remove(&key).is_some()
    }

    /// Remove all entries and reset the hit/miss counters
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.counters = CacheCounters::default();
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let approx_byte_size = state
            .entries
            .values()
            .map(|entry| serde_json::to_vec(entry).map(|bytes| bytes.len()).unwrap_or(0))
            .sum();

        CacheStats {
            hits: state.counters.hits,
            misses: state.counters.misses,
            entry_count: state.entries.len(),
            approx_byte_size,
        }
    }

    /// Remove every entry past the max age, regardless of file state
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut state = self.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| now - entry.created_at < self.max_age);
        let removed = before - state.entries.len();

        if removed > 0 {
            debug!("Removed {} expired cache entries", removed);
        }
        removed
    }

    /// Write all entries and counters to a JSON snapshot
    pub fn export<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let snapshot = {
            let state = self.lock();
            let mut entries: Vec<CacheEntry> = state.entries.values().cloned().collect();
            entries.sort_by_key(|entry| entry.created_at);
            CacheSnapshot {
                version: SNAPSHOT_VERSION,
                exported_at: Utc::now(),
                stats: state.counters,
                entries,
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, content)?;

        info!("Exported {} cache entries to {}", snapshot.entries.len(), path.display());
        Ok(())
    }

    /// Replace the cache contents with a snapshot. A missing or malformed
    /// snapshot is logged and leaves the cache untouched.
    pub fn import<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        match read_snapshot(path) {
            Ok(snapshot) => {
                let count = snapshot.entries.len();
                let mut state = self.lock();
                state.entries = snapshot
                    .entries
                    .into_iter()
                    .map(|entry| (entry.key.clone(), entry))
                    .collect();
                state.counters = snapshot.stats;
                info!("Imported {} cache entries from {}", count, path.display());
                true
            }
            Err(e) => {
                warn!("Ignoring cache snapshot {}: {}", path.display(), e);
                false
            }
        }
    }
}

fn read_snapshot(path: &Path) -> Result<CacheSnapshot> {
    let content = std::fs::read_to_string(path)?;
    let snapshot: CacheSnapshot = serde_json::from_str(&content)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PatchwrightError::Snapshot(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }
    Ok(snapshot)
}

/// Sorted, deduplicated copy of a file set
pub fn canonical_file_set(files: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = files.to_vec();
    files.sort();
    files.dedup();
    files
}

/// Order-independent cache key for a canonical file set
pub fn fingerprint(files: &[PathBuf]) -> String {
    let joined = files
        .iter()
        .map(|path| path.to_string_lossy())
        .collect::<Vec<_>>()
        .join(KEY_DELIMITER);

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Composite hash of each file's mtime, size and content length.
/// `None` when any file is missing or unreadable.
pub fn staleness_hash(files: &[PathBuf]) -> Option<String> {
    let mut hasher = Sha256::new();

    for path in files {
        let metadata = std::fs::metadata(path).ok()?;
        let mtime = metadata
            .modified()
            .ok()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let content_length = std::fs::read(path).ok()?.len();

        hasher.update(
            format!(
                "{}|{}|{}|{}{}",
                path.display(),
                mtime,
                metadata.len(),
                content_length,
                KEY_DELIMITER
            )
            .as_bytes(),
        );
    }

    Some(format!("{:x}", hasher.finalize()))
}

fn short(key: &str) -> &str {
    &key[..key.len().min(12)]
}
