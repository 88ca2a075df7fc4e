//! Per-workspace session stores and the registry that owns them.
//!
//! The registry is the only process-wide state: create one at startup,
//! call [`WorkspaceRegistry::clear_all`] at logout. Each workspace id maps
//! to exactly one [`WorkspaceStore`]; switching workspaces swaps the active
//! `Arc`, it never merges data between stores.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::config::StorageConfig;
use crate::error::Result;
use crate::kv::{FileBackend, QuotaSafeStore, WriteOutcome};
use crate::paths::{self, ACTIVE_WORKSPACE_KEY};
use crate::session::{self, ChatMessage, FieldValue, FlowRecord, Reconciled, WizardSession};
use crate::types::FlowKind;

// ---------------------------------------------------------------------------
// WorkspaceStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct WorkspaceStore {
    workspace_id: String,
    kv: Arc<QuotaSafeStore>,
    flows: Mutex<BTreeMap<FlowKind, FlowRecord>>,
    /// Set once the store is evicted; later mutations stay in memory.
    retired: AtomicBool,
}

impl WorkspaceStore {
    fn new(workspace_id: String, kv: Arc<QuotaSafeStore>) -> Self {
        Self {
            workspace_id,
            kv,
            flows: Mutex::new(BTreeMap::new()),
            retired: AtomicBool::new(false),
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    pub fn session(&self, flow: FlowKind) -> Option<WizardSession> {
        self.with_record(flow, |rec| rec.session.clone())
    }

    /// Replace the authoritative session for its flow and re-derive drafts.
    ///
    /// Drafts for fields the server has answered are discarded; the local
    /// `current_step` never moves backwards.
    pub fn set_session(&self, server: WizardSession) -> Reconciled {
        let flow = server.flow;
        let reconciled = self.with_record_mut(flow, |rec| {
            let r = session::reconcile(rec.session.as_ref(), &rec.drafts, server);
            rec.session = Some(r.session.clone());
            rec.drafts = r.drafts.clone();
            r
        });
        if reconciled.stale_server {
            tracing::warn!(
                workspace = %self.workspace_id,
                flow = %flow,
                step = reconciled.session.current_step,
                "server reported an older step than seen locally; keeping local step"
            );
        }
        self.persist(flow);
        reconciled
    }

    /// Apply a local correction to the session (conflict recovery).
    /// Returns `None` when the flow has no session.
    pub fn update_session<R>(
        &self,
        flow: FlowKind,
        f: impl FnOnce(&mut WizardSession) -> R,
    ) -> Option<R> {
        let out = self.with_record_mut(flow, |rec| rec.session.as_mut().map(f));
        if out.is_some() {
            self.persist(flow);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Drafts
    // -----------------------------------------------------------------------

    pub fn set_draft(&self, flow: FlowKind, step: u32, field: &str, value: FieldValue) {
        let changed = self.with_record_mut(flow, |rec| {
            let slot = rec.drafts.entry(step).or_default();
            if slot.get(field) == Some(&value) {
                return false;
            }
            slot.insert(field.to_string(), value);
            true
        });
        if changed {
            self.persist(flow);
        }
    }

    pub fn draft(&self, flow: FlowKind, step: u32, field: &str) -> Option<FieldValue> {
        self.with_record(flow, |rec| {
            rec.drafts.get(&step).and_then(|d| d.get(field)).cloned()
        })
    }

    pub fn drafts_for_step(&self, flow: FlowKind, step: u32) -> BTreeMap<String, FieldValue> {
        self.with_record(flow, |rec| rec.drafts.get(&step).cloned().unwrap_or_default())
    }

    pub fn clear_step_drafts(&self, flow: FlowKind, step: u32) {
        let removed = self.with_record_mut(flow, |rec| rec.drafts.remove(&step).is_some());
        if removed {
            self.persist(flow);
        }
    }

    // -----------------------------------------------------------------------
    // Transcript
    // -----------------------------------------------------------------------

    pub fn push_message(&self, flow: FlowKind, message: ChatMessage) {
        self.with_record_mut(flow, |rec| rec.messages.push(message));
        self.persist(flow);
    }

    pub fn messages(&self, flow: FlowKind) -> Vec<ChatMessage> {
        self.with_record(flow, |rec| rec.messages.clone())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn persist(&self, flow: FlowKind) -> WriteOutcome {
        if self.retired.load(Ordering::Acquire) {
            tracing::debug!(workspace = %self.workspace_id, flow = %flow, "store was cleared; not persisting");
            return WriteOutcome::MemoryOnly;
        }
        let record = self.with_record(flow, FlowRecord::clone);
        let key = paths::session_key(flow, &self.workspace_id);
        let outcome = self.kv.set_truncatable(&key, &record);
        if !outcome.is_persisted() {
            tracing::debug!(key = %key, "flow record kept in memory only");
        }
        outcome
    }

    /// Drop in-memory records and every persisted key this workspace owns.
    fn clear(&self) {
        self.retire();
        self.lock_flows().clear();
        let removed = self.kv.remove_workspace(&self.workspace_id);
        tracing::debug!(workspace = %self.workspace_id, removed = removed.len(), "cleared workspace store");
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    fn with_record<R>(&self, flow: FlowKind, f: impl FnOnce(&FlowRecord) -> R) -> R {
        let mut flows = self.lock_flows();
        let rec = self.load_into(&mut flows, flow);
        f(rec)
    }

    fn with_record_mut<R>(&self, flow: FlowKind, f: impl FnOnce(&mut FlowRecord) -> R) -> R {
        let mut flows = self.lock_flows();
        let rec = self.load_into(&mut flows, flow);
        f(rec)
    }

    fn load_into<'a>(
        &self,
        flows: &'a mut BTreeMap<FlowKind, FlowRecord>,
        flow: FlowKind,
    ) -> &'a mut FlowRecord {
        flows.entry(flow).or_insert_with(|| {
            let key = paths::session_key(flow, &self.workspace_id);
            self.kv.get::<FlowRecord>(&key).unwrap_or_default()
        })
    }

    fn lock_flows(&self) -> MutexGuard<'_, BTreeMap<FlowKind, FlowRecord>> {
        self.flows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// WorkspaceRegistry
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct WorkspaceRegistry {
    kv: Arc<QuotaSafeStore>,
    stores: Mutex<HashMap<String, Arc<WorkspaceStore>>>,
    active: RwLock<Option<Arc<WorkspaceStore>>>,
}

impl WorkspaceRegistry {
    pub fn new(kv: Arc<QuotaSafeStore>) -> Self {
        Self {
            kv,
            stores: Mutex::new(HashMap::new()),
            active: RwLock::new(None),
        }
    }

    /// Registry over the file-backed store under `<root>/.wizard/store`.
    pub fn open(root: &Path, storage: &StorageConfig) -> Self {
        let dir = paths::store_dir(root);
        let backend = match storage.quota_bytes {
            Some(bytes) => FileBackend::with_capacity(dir, bytes),
            None => FileBackend::new(dir),
        };
        let kv = QuotaSafeStore::new(Arc::new(backend)).with_history_keep(storage.history_keep);
        Self::new(Arc::new(kv))
    }

    pub fn kv(&self) -> &Arc<QuotaSafeStore> {
        &self.kv
    }

    /// Restore the persisted workspace selection. Synchronous: runs before
    /// any network call so the first render already has the right store.
    pub fn bootstrap(&self) -> Option<Arc<WorkspaceStore>> {
        let id: String = self.kv.get(ACTIVE_WORKSPACE_KEY)?;
        match self.activate(&id) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(workspace = %id, error = %e, "ignoring invalid persisted workspace selection");
                self.kv.remove(ACTIVE_WORKSPACE_KEY);
                None
            }
        }
    }

    /// The store for `workspace_id`, created on first use and memoised.
    pub fn get_store(&self, workspace_id: &str) -> Result<Arc<WorkspaceStore>> {
        paths::validate_workspace_id(workspace_id)?;
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        let store = stores
            .entry(workspace_id.to_string())
            .or_insert_with(|| {
                Arc::new(WorkspaceStore::new(
                    workspace_id.to_string(),
                    Arc::clone(&self.kv),
                ))
            });
        Ok(Arc::clone(store))
    }

    /// Make `workspace_id` the active workspace and persist the selection.
    pub fn switch_to(&self, workspace_id: &str) -> Result<Arc<WorkspaceStore>> {
        let store = self.activate(workspace_id)?;
        self.kv.set(ACTIVE_WORKSPACE_KEY, &workspace_id);
        tracing::info!(workspace = %workspace_id, "switched workspace");
        Ok(store)
    }

    pub fn active(&self) -> Option<Arc<WorkspaceStore>> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Evict the cached store and its persisted data.
    pub fn clear_store(&self, workspace_id: &str) {
        let cached = self
            .stores
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(workspace_id);
        match cached {
            Some(store) => store.clear(),
            None => {
                self.kv.remove_workspace(workspace_id);
            }
        }

        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        if active
            .as_ref()
            .is_some_and(|s| s.workspace_id() == workspace_id)
        {
            *active = None;
            self.kv.set_active_workspace(None);
            self.kv.remove(ACTIVE_WORKSPACE_KEY);
        }
    }

    /// Logout: drop every cached store and all persisted state.
    pub fn clear_all(&self) {
        for (_, store) in self
            .stores
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
        {
            store.retire();
        }
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.kv.set_active_workspace(None);
        for key in self.kv.keys() {
            self.kv.remove(&key);
        }
    }

    fn activate(&self, workspace_id: &str) -> Result<Arc<WorkspaceStore>> {
        let store = self.get_store(workspace_id)?;
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&store));
        self.kv.set_active_workspace(Some(workspace_id));
        Ok(store)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FileBackend, MemoryBackend};
    use tempfile::TempDir;

    fn registry() -> WorkspaceRegistry {
        WorkspaceRegistry::new(Arc::new(QuotaSafeStore::new(Arc::new(MemoryBackend::new()))))
    }

    fn session(id: &str, step: u32) -> WizardSession {
        let mut s = WizardSession::new(id, FlowKind::Ava);
        s.current_step = step;
        s
    }

    #[test]
    fn get_store_is_memoised() {
        let reg = registry();
        let a1 = reg.get_store("a").unwrap();
        let a2 = reg.get_store("a").unwrap();
        let b = reg.get_store("b").unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
    }

    #[test]
    fn invalid_workspace_id_is_rejected() {
        assert!(registry().get_store("a.b").is_err());
    }

    #[test]
    fn switching_workspace_swaps_drafts_atomically() {
        let reg = registry();
        let a = reg.switch_to("a").unwrap();
        a.set_draft(FlowKind::Ava, 2, "ideal_client", FieldValue::text("from A"));

        let b = reg.switch_to("b").unwrap();
        let active = reg.active().unwrap();
        assert!(Arc::ptr_eq(&active, &b));
        assert_eq!(b.draft(FlowKind::Ava, 2, "ideal_client"), None);
        assert!(b.drafts_for_step(FlowKind::Ava, 2).is_empty());

        let back = reg.switch_to("a").unwrap();
        assert_eq!(
            back.draft(FlowKind::Ava, 2, "ideal_client"),
            Some(FieldValue::text("from A"))
        );
    }

    #[test]
    fn set_session_overwrites_drafts_server_has_answered() {
        let reg = registry();
        let store = reg.get_store("a").unwrap();
        store.set_draft(FlowKind::Ava, 2, "ideal_client", FieldValue::text("draft"));
        store.set_draft(FlowKind::Ava, 2, "pain_points", FieldValue::text("draft pain"));

        let mut server = session("s1", 2);
        server
            .fields
            .insert("ideal_client".into(), FieldValue::text("server"));
        store.set_session(server);

        assert_eq!(store.draft(FlowKind::Ava, 2, "ideal_client"), None);
        assert_eq!(
            store.draft(FlowKind::Ava, 2, "pain_points"),
            Some(FieldValue::text("draft pain"))
        );
    }

    #[test]
    fn set_session_never_regresses_step() {
        let reg = registry();
        let store = reg.get_store("a").unwrap();
        store.set_session(session("s1", 3));
        let r = store.set_session(session("s1", 2));
        assert!(r.stale_server);
        assert_eq!(store.session(FlowKind::Ava).unwrap().current_step, 3);
    }

    #[test]
    fn state_survives_reload_through_file_backend() {
        let dir = TempDir::new().unwrap();
        let make = || {
            let kv = QuotaSafeStore::new(Arc::new(FileBackend::new(dir.path())));
            WorkspaceRegistry::new(Arc::new(kv))
        };

        let reg = make();
        let store = reg.switch_to("acme").unwrap();
        store.set_session(session("s1", 2));
        store.set_draft(FlowKind::Ava, 2, "pain_points", FieldValue::text("slow sales"));
        drop(reg);

        let reg = make();
        let restored = reg.bootstrap().expect("selection persisted");
        assert_eq!(restored.workspace_id(), "acme");
        assert_eq!(restored.session(FlowKind::Ava).unwrap().current_step, 2);
        assert_eq!(
            restored.draft(FlowKind::Ava, 2, "pain_points"),
            Some(FieldValue::text("slow sales"))
        );
    }

    #[test]
    fn open_uses_store_dir_under_root() {
        let dir = TempDir::new().unwrap();
        let reg = WorkspaceRegistry::open(dir.path(), &StorageConfig::default());
        reg.switch_to("acme").unwrap();
        assert!(paths::store_dir(dir.path()).is_dir());
        let again = WorkspaceRegistry::open(dir.path(), &StorageConfig::default());
        assert_eq!(again.bootstrap().unwrap().workspace_id(), "acme");
    }

    #[test]
    fn clear_store_evicts_instance_and_persisted_data() {
        let reg = registry();
        let a = reg.switch_to("a").unwrap();
        a.set_session(session("s1", 2));
        reg.get_store("b")
            .unwrap()
            .set_session(session("s2", 1));

        reg.clear_store("a");

        assert!(reg.active().is_none());
        let fresh = reg.get_store("a").unwrap();
        assert!(!Arc::ptr_eq(&a, &fresh));
        assert!(fresh.session(FlowKind::Ava).is_none());
        assert_eq!(reg.kv().keys(), vec!["wizard.ava.b".to_string()]);
    }

    #[test]
    fn stale_handle_cannot_resurrect_cleared_data() {
        let reg = registry();
        let a = reg.switch_to("a").unwrap();
        a.set_session(session("s1", 2));

        reg.clear_store("a");
        a.set_draft(FlowKind::Ava, 2, "ideal_client", FieldValue::text("Busy founders"));
        a.set_session(session("s1", 3));

        assert!(reg.kv().keys().is_empty());
        assert!(reg.get_store("a").unwrap().session(FlowKind::Ava).is_none());
    }

    #[test]
    fn clear_all_retires_cached_stores() {
        let reg = registry();
        let b = reg.get_store("b").unwrap();
        reg.clear_all();
        b.set_session(session("s2", 1));
        assert!(reg.kv().keys().is_empty());
    }

    #[test]
    fn clear_all_forgets_selection() {
        let reg = registry();
        reg.switch_to("a").unwrap();
        reg.clear_all();
        assert!(reg.active().is_none());
        assert!(reg.bootstrap().is_none());
        assert!(reg.kv().keys().is_empty());
    }

    #[test]
    fn identical_draft_is_not_rewritten() {
        use crate::kv::testing::CountingBackend;
        let backend = Arc::new(CountingBackend::default());
        let reg = WorkspaceRegistry::new(Arc::new(QuotaSafeStore::new(backend.clone())));
        let store = reg.get_store("a").unwrap();
        store.set_draft(FlowKind::Ava, 1, "business_name", FieldValue::text("Acme"));
        store.set_draft(FlowKind::Ava, 1, "business_name", FieldValue::text("Acme"));
        assert_eq!(backend.writes(), 1);
    }
}
