//! Quota-safe key/value persistence.
//!
//! [`QuotaSafeStore`] wraps a [`KvBackend`] and guarantees that a write never
//! fails from the caller's point of view. When the backend reports a quota
//! failure the store walks a degradation ladder:
//!
//! ```text
//! set(key) ── ok ──────────────────────────────────────────▶ Persisted
//!    │ quota
//!    ▼
//! purge foreign cache.* keys ── retry ok ─────────────────▶ Degraded(PurgedForeignCaches)
//!    │ quota
//!    ▼
//! purge other workspaces' keys ── retry ok ──────────────▶ Degraded(PurgedForeignData)
//!    │ quota (retry skipped if nothing was purged and the value can shrink)
//!    ▼
//! truncate history (if the value has one) ── retry ok ────▶ Degraded(TruncatedHistory)
//!    │ quota / other error
//!    ▼
//! keep value in the in-memory overlay ────────────────────▶ MemoryOnly
//! ```
//!
//! Keys owned by the active workspace, the active-workspace selection and
//! amplifier drafts are never purged.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::KvError;
use crate::paths::{self, ACTIVE_WORKSPACE_KEY, CACHE_PREFIX};

// ---------------------------------------------------------------------------
// KvBackend
// ---------------------------------------------------------------------------

/// Raw string storage. Implementations use interior mutability so a single
/// backend can be shared by every store in the process.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    fn set(&self, key: &str, value: &str) -> Result<(), KvError>;
    /// Returns whether the key existed.
    fn remove(&self, key: &str) -> Result<bool, KvError>;
    fn keys(&self) -> Result<Vec<String>, KvError>;
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// In-process backend with an optional byte capacity (key + value bytes).
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            capacity: Some(bytes),
        }
    }

    pub fn used_bytes(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cap) = self.capacity {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + value.len();
            if others + needed > cap {
                return Err(KvError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available: cap.saturating_sub(others),
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, KvError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, KvError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.keys().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// FileBackend
// ---------------------------------------------------------------------------

/// One `<key>.json` file per key under a directory, written atomically.
///
/// The optional capacity bounds the summed size of all value files.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    capacity: Option<usize>,
    // Serialises the size check with the write that follows it.
    write_lock: Mutex<()>,
}

const FILE_EXT: &str = "json";

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            capacity: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_capacity(dir: impl Into<PathBuf>, bytes: usize) -> Self {
        Self {
            capacity: Some(bytes),
            ..Self::new(dir)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{FILE_EXT}"))
    }

    fn used_bytes_except(&self, key: &str) -> Result<usize, KvError> {
        let mut total = 0usize;
        for k in self.keys()? {
            if k == key {
                continue;
            }
            total += std::fs::metadata(self.path(&k))
                .map(|m| m.len() as usize)
                .unwrap_or(0);
        }
        Ok(total)
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(crate::io::read_optional(&self.path(key))?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cap) = self.capacity {
            let others = self.used_bytes_except(key)?;
            if others + value.len() > cap {
                return Err(KvError::QuotaExceeded {
                    key: key.to_string(),
                    needed: value.len(),
                    available: cap.saturating_sub(others),
                });
            }
        }
        crate::io::atomic_write(&self.path(key), value.as_bytes())?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, KvError> {
        Ok(crate::io::remove_if_exists(&self.path(key))?)
    }

    fn keys(&self) -> Result<Vec<String>, KvError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Truncate
// ---------------------------------------------------------------------------

/// Values carrying a growable history list that may be shortened to fit
/// storage.
pub trait Truncate {
    /// Keep at most `keep` history entries. Returns false when the history
    /// was already within bounds (nothing to gain from a retry).
    fn truncate_history(&mut self, keep: usize) -> bool;
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    PurgedForeignCaches,
    PurgedForeignData,
    TruncatedHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Persisted,
    Degraded(Degradation),
    /// The write was dropped; the value lives only in memory for this key.
    MemoryOnly,
}

impl WriteOutcome {
    pub fn is_persisted(self) -> bool {
        !matches!(self, WriteOutcome::MemoryOnly)
    }
}

// ---------------------------------------------------------------------------
// QuotaSafeStore
// ---------------------------------------------------------------------------

pub const DEFAULT_HISTORY_KEEP: usize = 5;

pub struct QuotaSafeStore {
    backend: Arc<dyn KvBackend>,
    active_workspace: RwLock<Option<String>>,
    overlay: Mutex<HashMap<String, String>>,
    history_keep: usize,
}

impl std::fmt::Debug for QuotaSafeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaSafeStore")
            .field("history_keep", &self.history_keep)
            .finish_non_exhaustive()
    }
}

impl QuotaSafeStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            active_workspace: RwLock::new(None),
            overlay: Mutex::new(HashMap::new()),
            history_keep: DEFAULT_HISTORY_KEEP,
        }
    }

    pub fn with_history_keep(mut self, keep: usize) -> Self {
        self.history_keep = keep.max(1);
        self
    }

    /// In-memory store; used when no persistent backend is configured.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Set the workspace whose keys the degradation ladder must never purge.
    pub fn set_active_workspace(&self, workspace_id: Option<&str>) {
        let mut active = self
            .active_workspace
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *active = workspace_id.map(str::to_string);
    }

    pub fn active_workspace(&self) -> Option<String> {
        self.active_workspace
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Raw string value, preferring a memory-only overlay entry.
    pub fn get_raw(&self, key: &str) -> Option<String> {
        if let Some(v) = self.overlay_lock().get(key) {
            return Some(v.clone());
        }
        match self.backend.get(key) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "storage read failed; treating as absent");
                None
            }
        }
    }

    /// Typed read. Malformed persisted data is treated as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding malformed persisted value");
                None
            }
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys = self.backend.keys().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "storage key listing failed");
            Vec::new()
        });
        for k in self.overlay_lock().keys() {
            if !keys.contains(k) {
                keys.push(k.clone());
            }
        }
        keys.sort();
        keys
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Persist `value` under `key`, degrading instead of failing.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> WriteOutcome {
        match serde_json::to_string(value) {
            Ok(json) => self.write_with_ladder(key, json, None::<fn() -> Option<String>>),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "value not serializable; skipping write");
                WriteOutcome::MemoryOnly
            }
        }
    }

    /// Like [`set`](Self::set), with history truncation as an extra rung.
    pub fn set_truncatable<T>(&self, key: &str, value: &T) -> WriteOutcome
    where
        T: Serialize + Clone + Truncate,
    {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "value not serializable; skipping write");
                return WriteOutcome::MemoryOnly;
            }
        };
        let keep = self.history_keep;
        let truncated = || {
            let mut copy = value.clone();
            if copy.truncate_history(keep) {
                serde_json::to_string(&copy).ok()
            } else {
                None
            }
        };
        self.write_with_ladder(key, json, Some(truncated))
    }

    pub fn remove(&self, key: &str) {
        self.overlay_lock().remove(key);
        if let Err(e) = self.backend.remove(key) {
            tracing::warn!(key = %key, error = %e, "storage remove failed");
        }
    }

    /// Remove every key owned by `workspace_id`. Returns the removed keys.
    pub fn remove_workspace(&self, workspace_id: &str) -> Vec<String> {
        let owned: Vec<String> = self
            .keys()
            .into_iter()
            .filter(|k| paths::key_belongs_to(k, workspace_id))
            .collect();
        for k in &owned {
            self.remove(k);
        }
        owned
    }

    fn write_with_ladder<F>(&self, key: &str, json: String, truncated: Option<F>) -> WriteOutcome
    where
        F: FnOnce() -> Option<String>,
    {
        let err = match self.try_write(key, &json) {
            Ok(()) => return WriteOutcome::Persisted,
            Err(e) => e,
        };
        if !err.is_quota() {
            return self.fall_back_to_memory(key, json, &err);
        }
        tracing::warn!(key = %key, error = %err, "storage quota exceeded; cleaning up");

        let mut last_err = err;
        for (rung, purge) in [
            (
                Degradation::PurgedForeignCaches,
                PurgeLevel::ForeignCaches,
            ),
            (Degradation::PurgedForeignData, PurgeLevel::ForeignData),
        ] {
            let removed = self.purge(key, purge);
            // Nothing more was freed; the truncated write is the next attempt.
            if removed == 0 && purge == PurgeLevel::ForeignData && truncated.is_some() {
                break;
            }
            match self.try_write(key, &json) {
                Ok(()) => {
                    tracing::info!(key = %key, ?rung, "write succeeded after cleanup");
                    return WriteOutcome::Degraded(rung);
                }
                Err(e) if e.is_quota() => last_err = e,
                Err(e) => return self.fall_back_to_memory(key, json, &e),
            }
        }

        if let Some(short) = truncated.and_then(|f| f()) {
            match self.try_write(key, &short) {
                Ok(()) => {
                    tracing::info!(key = %key, keep = self.history_keep, "write succeeded after truncating history");
                    return WriteOutcome::Degraded(Degradation::TruncatedHistory);
                }
                Err(e) => last_err = e,
            }
        }

        self.fall_back_to_memory(key, json, &last_err)
    }

    fn try_write(&self, key: &str, json: &str) -> Result<(), KvError> {
        self.backend.set(key, json)?;
        self.overlay_lock().remove(key);
        Ok(())
    }

    fn fall_back_to_memory(&self, key: &str, json: String, err: &KvError) -> WriteOutcome {
        tracing::warn!(key = %key, error = %err, "persistence disabled for key; keeping value in memory");
        self.overlay_lock().insert(key.to_string(), json);
        WriteOutcome::MemoryOnly
    }

    /// Delete purgeable keys for `level`. Returns how many were removed.
    fn purge(&self, writing: &str, level: PurgeLevel) -> usize {
        let active = self.active_workspace();
        let keys = match self.backend.keys() {
            Ok(k) => k,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list keys for cleanup");
                return 0;
            }
        };
        let mut removed = 0;
        for k in keys {
            if k == writing || !is_purgeable(&k, active.as_deref(), level) {
                continue;
            }
            match self.backend.remove(&k) {
                Ok(true) => {
                    tracing::debug!(key = %k, ?level, "purged key to free storage");
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(key = %k, error = %e, "cleanup remove failed"),
            }
        }
        removed
    }

    fn overlay_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.overlay.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PurgeLevel {
    ForeignCaches,
    ForeignData,
}

fn is_purgeable(key: &str, active: Option<&str>, level: PurgeLevel) -> bool {
    if key == ACTIVE_WORKSPACE_KEY || key.starts_with("amplifier.") {
        return false;
    }
    let owned = active.is_some_and(|ws| paths::key_belongs_to(key, ws));
    let is_cache = key.starts_with(CACHE_PREFIX);
    match level {
        PurgeLevel::ForeignCaches => is_cache && !owned,
        PurgeLevel::ForeignData => !owned,
    }
}

// ---------------------------------------------------------------------------
// Test backends
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps a memory backend, counts successful writes and can be told to
    /// fail the next N writes with a quota error.
    #[derive(Default)]
    pub struct CountingBackend {
        pub inner: MemoryBackend,
        pub writes: AtomicUsize,
        pub attempts: AtomicUsize,
        pub fail_next: AtomicUsize,
    }

    impl CountingBackend {
        pub fn failing(n: usize) -> Self {
            let b = Self::default();
            b.fail_next.store(n, Ordering::SeqCst);
            b
        }

        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl KvBackend for CountingBackend {
        fn get(&self, key: &str) -> Result<Option<String>, KvError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let pending = self.fail_next.load(Ordering::SeqCst);
            if pending > 0 {
                self.fail_next.store(pending - 1, Ordering::SeqCst);
                return Err(KvError::QuotaExceeded {
                    key: key.to_string(),
                    needed: value.len(),
                    available: 0,
                });
            }
            self.inner.set(key, value)?;
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<bool, KvError> {
            self.inner.remove(key)
        }

        fn keys(&self) -> Result<Vec<String>, KvError> {
            self.inner.keys()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::testing::CountingBackend;
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Chat {
        title: String,
        messages: Vec<String>,
    }

    impl Truncate for Chat {
        fn truncate_history(&mut self, keep: usize) -> bool {
            if self.messages.len() <= keep {
                return false;
            }
            self.messages.drain(..self.messages.len() - keep);
            true
        }
    }

    fn chat(n: usize) -> Chat {
        Chat {
            title: "t".into(),
            messages: (0..n).map(|i| format!("message number {i:03}")).collect(),
        }
    }

    #[test]
    fn get_treats_malformed_json_as_absent() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set("wizard.ava.ws1", "{not json").unwrap();
        let store = QuotaSafeStore::new(backend);
        assert_eq!(store.get::<Chat>("wizard.ava.ws1"), None);
    }

    #[test]
    fn get_treats_wrong_shape_as_absent() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set("k", r#"{"title": 5}"#).unwrap();
        let store = QuotaSafeStore::new(backend);
        assert_eq!(store.get::<Chat>("k"), None);
    }

    #[test]
    fn set_then_get_persists() {
        let store = QuotaSafeStore::in_memory();
        assert_eq!(store.set("k", &chat(2)), WriteOutcome::Persisted);
        assert_eq!(store.get::<Chat>("k"), Some(chat(2)));
    }

    #[test]
    fn first_rung_purges_foreign_caches_only() {
        let backend = Arc::new(CountingBackend::failing(1));
        backend.inner.set("cache.options.other", "[1,2,3]").unwrap();
        backend.inner.set("cache.options.ws1", "[1]").unwrap();
        backend.inner.set("wizard.ava.other", "{}").unwrap();
        let store = QuotaSafeStore::new(backend.clone());
        store.set_active_workspace(Some("ws1"));

        let outcome = store.set("wizard.ava.ws1", &chat(1));

        assert_eq!(
            outcome,
            WriteOutcome::Degraded(Degradation::PurgedForeignCaches)
        );
        let keys = backend.keys().unwrap();
        assert!(!keys.contains(&"cache.options.other".to_string()));
        assert!(keys.contains(&"cache.options.ws1".to_string()));
        assert!(keys.contains(&"wizard.ava.other".to_string()));
    }

    #[test]
    fn second_rung_drops_other_workspaces_but_not_active_or_bootstrap() {
        let backend = Arc::new(CountingBackend::failing(2));
        backend.inner.set("cache.options.other", "[]").unwrap();
        backend.inner.set("cache.options.ws1", "[]").unwrap();
        backend.inner.set("wizard.vera.other", "{}").unwrap();
        backend.inner.set("wizard.vera.ws1", "{}").unwrap();
        backend.inner.set(ACTIVE_WORKSPACE_KEY, "\"ws1\"").unwrap();
        backend.inner.set("amplifier.form.ad_copy", "{}").unwrap();
        let store = QuotaSafeStore::new(backend.clone());
        store.set_active_workspace(Some("ws1"));

        let outcome = store.set("wizard.ava.ws1", &chat(1));

        assert_eq!(outcome, WriteOutcome::Degraded(Degradation::PurgedForeignData));
        let keys = backend.keys().unwrap();
        assert_eq!(
            keys,
            vec![
                "amplifier.form.ad_copy".to_string(),
                "cache.options.ws1".to_string(),
                "wizard.ava.ws1".to_string(),
                "wizard.vera.ws1".to_string(),
                ACTIVE_WORKSPACE_KEY.to_string(),
            ]
        );
    }

    #[test]
    fn two_quota_failures_then_truncated_write_succeeds() {
        // One foreign cache to purge (retry fails), nothing else to purge,
        // then the truncated value is the third attempt.
        let backend = Arc::new(CountingBackend::failing(2));
        backend.inner.set("cache.options.other", "[]").unwrap();
        let store = QuotaSafeStore::new(backend.clone());
        store.set_active_workspace(Some("ws1"));

        let outcome = store.set_truncatable("wizard.ava.ws1", &chat(40));

        assert_eq!(outcome, WriteOutcome::Degraded(Degradation::TruncatedHistory));
        assert_eq!(backend.attempts(), 3);
        let stored: Chat = store.get("wizard.ava.ws1").unwrap();
        assert_eq!(stored.messages.len(), 5);
        assert_eq!(stored.messages.last().unwrap(), "message number 039");
    }

    #[test]
    fn truncated_write_is_reached_with_nothing_to_purge() {
        let backend = Arc::new(CountingBackend::failing(2));
        let store = QuotaSafeStore::new(backend.clone());
        store.set_active_workspace(Some("ws1"));

        let outcome = store.set_truncatable("wizard.ava.ws1", &chat(40));

        assert_eq!(outcome, WriteOutcome::Degraded(Degradation::TruncatedHistory));
        assert_eq!(backend.attempts(), 3);
        assert_eq!(backend.writes(), 1);
        let stored: Chat = store.get("wizard.ava.ws1").unwrap();
        assert_eq!(stored.messages.len(), 5);
    }

    #[test]
    fn every_rung_retries_plain_values() {
        let backend = Arc::new(CountingBackend::failing(2));
        let store = QuotaSafeStore::new(backend.clone());

        let outcome = store.set("k", &chat(1));

        assert_eq!(outcome, WriteOutcome::Degraded(Degradation::PurgedForeignData));
        assert_eq!(backend.attempts(), 3);
    }

    #[test]
    fn exhausted_ladder_falls_back_to_memory_without_error() {
        let backend = Arc::new(CountingBackend::failing(usize::MAX));
        let store = QuotaSafeStore::new(backend.clone());

        let outcome = store.set_truncatable("wizard.ava.ws1", &chat(40));

        assert_eq!(outcome, WriteOutcome::MemoryOnly);
        assert_eq!(backend.writes(), 0);
        // Still readable for the rest of the process lifetime.
        assert_eq!(store.get::<Chat>("wizard.ava.ws1"), Some(chat(40)));
    }

    #[test]
    fn memory_overlay_is_cleared_by_later_successful_write() {
        let backend = Arc::new(CountingBackend::failing(3));
        let store = QuotaSafeStore::new(backend.clone());
        assert_eq!(store.set("k", &chat(1)), WriteOutcome::MemoryOnly);
        assert_eq!(store.set("k", &chat(2)), WriteOutcome::Persisted);
        assert!(backend.get("k").unwrap().is_some());
        assert_eq!(store.get::<Chat>("k"), Some(chat(2)));
    }

    #[test]
    fn memory_backend_enforces_capacity() {
        let backend = MemoryBackend::with_capacity(10);
        assert!(backend.set("a", "1234").is_ok());
        let err = backend.set("b", "123456789").unwrap_err();
        assert!(err.is_quota());
        // Replacing an existing key only counts the new value.
        assert!(backend.set("a", "12345678").is_ok());
    }

    #[test]
    fn file_backend_roundtrip_and_keys() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("store"));
        assert!(backend.keys().unwrap().is_empty());
        backend.set("wizard.ava.ws1", "{}").unwrap();
        backend.set("workspace.active", "\"ws1\"").unwrap();
        assert_eq!(
            backend.keys().unwrap(),
            vec!["wizard.ava.ws1".to_string(), "workspace.active".to_string()]
        );
        assert_eq!(backend.get("wizard.ava.ws1").unwrap().as_deref(), Some("{}"));
        assert!(backend.remove("wizard.ava.ws1").unwrap());
        assert_eq!(backend.get("wizard.ava.ws1").unwrap(), None);
    }

    #[test]
    fn file_backend_quota_drives_truncation() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FileBackend::with_capacity(dir.path(), 300));
        let store = QuotaSafeStore::new(backend.clone());
        store.set_active_workspace(Some("ws1"));

        let outcome = store.set_truncatable("wizard.ava.ws1", &chat(40));

        assert_eq!(outcome, WriteOutcome::Degraded(Degradation::TruncatedHistory));
        let stored: Chat = store.get("wizard.ava.ws1").unwrap();
        assert_eq!(stored.messages.len(), 5);
    }

    #[test]
    fn remove_workspace_only_touches_owned_keys() {
        let store = QuotaSafeStore::in_memory();
        store.set("wizard.ava.ws1", &1);
        store.set("cache.options.ws1", &1);
        store.set("wizard.ava.ws2", &1);
        let mut removed = store.remove_workspace("ws1");
        removed.sort();
        assert_eq!(removed, vec!["cache.options.ws1", "wizard.ava.ws1"]);
        assert_eq!(store.keys(), vec!["wizard.ava.ws2".to_string()]);
    }
}
