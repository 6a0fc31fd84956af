use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::ids::{ensure_unique_ids, is_blank_id};
use super::{default_shortcuts, ShortcutEntry};
use crate::bus::{ShortcutBus, ShortcutChange};
use crate::error::{Result, StoreError};
use crate::storage::SharedDocumentStore;

/// In-memory authoritative list of shortcuts mirrored to a document store.
///
/// Every operation holds the state lock only for its in-memory section.
/// Saves run afterwards against a copy, and change events are published
/// once no lock is held, so subscribers may call straight back in.
pub struct ShortcutRegistry {
    store: SharedDocumentStore<Vec<ShortcutEntry>>,
    state: Mutex<RegistryState>,
    /// Revision of the newest list written to the store.
    save_gate: Mutex<u64>,
    read_only: AtomicBool,
    load_failure: Option<String>,
    bus: ShortcutBus,
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: Vec<ShortcutEntry>,
    revision: u64,
}

impl std::fmt::Debug for ShortcutRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortcutRegistry")
            .field("location", &self.store.location())
            .field("read_only", &self.is_read_only())
            .field("load_failure", &self.load_failure)
            .finish()
    }
}

impl ShortcutRegistry {
    /// Loads the registry from `store`.
    ///
    /// Blank or repeated ids are reassigned and the corrected list saved
    /// once. If the store cannot be read, the registry starts in read-only
    /// mode from the default shortcuts and reports the failure through
    /// [`ShortcutRegistry::load_failure`].
    pub fn open(store: SharedDocumentStore<Vec<ShortcutEntry>>) -> Self {
        Self::open_with_bus(store, ShortcutBus::default())
    }

    pub fn open_with_bus(store: SharedDocumentStore<Vec<ShortcutEntry>>, bus: ShortcutBus) -> Self {
        let (entries, repaired, load_failure) = match store.load_or_create() {
            Ok(mut entries) => {
                let repaired = ensure_unique_ids(&mut entries);
                (entries, repaired, None)
            }
            Err(error) => {
                tracing::error!(
                    path = %store.location().display(),
                    "shortcut load failed, continuing read-only: {error}"
                );
                let mut defaults = default_shortcuts();
                ensure_unique_ids(&mut defaults);
                (defaults, 0, Some(error.to_string()))
            }
        };

        let registry = Self {
            store,
            state: Mutex::new(RegistryState {
                entries,
                revision: 0,
            }),
            save_gate: Mutex::new(0),
            read_only: AtomicBool::new(load_failure.is_some()),
            load_failure,
            bus,
        };

        if repaired > 0 {
            tracing::info!(repaired, "reassigned shortcut ids on load");
            let (entries, revision) = {
                let mut state = registry.state.lock();
                state.revision += 1;
                (state.entries.clone(), state.revision)
            };
            let _ = registry.persist(&entries, revision);
        }

        tracing::info!(
            path = %registry.store.location().display(),
            count = registry.len(),
            read_only = registry.is_read_only(),
            "shortcut registry loaded"
        );
        registry
    }

    /// Deep copy of every shortcut in stored order.
    pub fn snapshot(&self) -> Vec<ShortcutEntry> {
        self.state.lock().entries.clone()
    }

    pub fn get(&self, id: &str) -> Option<ShortcutEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Appends `entry`, generating an id when it has none.
    ///
    /// Returns the stored copy, which carries the final id.
    pub fn add(&self, entry: ShortcutEntry) -> Result<ShortcutEntry> {
        let (added, entries, revision) = {
            let mut state = self.state.lock();
            if !is_blank_id(&entry.id) && state.entries.iter().any(|e| e.id == entry.id) {
                return Err(StoreError::DuplicateId(entry.id));
            }
            state.entries.push(entry);
            ensure_unique_ids(&mut state.entries);
            let added = state.entries[state.entries.len() - 1].clone();
            state.revision += 1;
            (added, state.entries.clone(), state.revision)
        };

        let _ = self.persist(&entries, revision);
        tracing::info!(id = %added.id, name = %added.name, url = %added.url, "added shortcut");
        self.bus.publish(ShortcutChange::added(added.clone()));
        Ok(added)
    }

    /// Replaces the shortcut sharing `entry.id`, keeping its position.
    pub fn update(&self, entry: ShortcutEntry) -> Result<ShortcutEntry> {
        let (before, entries, revision) = {
            let mut state = self.state.lock();
            let index = state
                .entries
                .iter()
                .position(|e| e.id == entry.id)
                .ok_or_else(|| StoreError::NotFound(entry.id.clone()))?;
            let before = std::mem::replace(&mut state.entries[index], entry.clone());
            state.revision += 1;
            (before, state.entries.clone(), state.revision)
        };

        let _ = self.persist(&entries, revision);
        tracing::info!(id = %entry.id, name = %entry.name, url = %entry.url, "updated shortcut");
        self.bus
            .publish(ShortcutChange::updated(before, entry.clone()));
        Ok(entry)
    }

    pub fn remove(&self, id: &str) -> Result<ShortcutEntry> {
        let (removed, entries, revision) = {
            let mut state = self.state.lock();
            let index = state
                .entries
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            let removed = state.entries.remove(index);
            state.revision += 1;
            (removed, state.entries.clone(), state.revision)
        };

        let _ = self.persist(&entries, revision);
        tracing::info!(id = %removed.id, name = %removed.name, url = %removed.url, "removed shortcut");
        self.bus.publish(ShortcutChange::removed(removed.clone()));
        Ok(removed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShortcutChange> {
        self.bus.subscribe()
    }

    /// True once a load or save has failed; edits then live in memory only.
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    pub fn load_failure(&self) -> Option<&str> {
        self.load_failure.as_deref()
    }

    /// Writes `entries` unless a newer revision already reached the store.
    fn persist(&self, entries: &Vec<ShortcutEntry>, revision: u64) -> Result<()> {
        if self.is_read_only() {
            tracing::debug!(revision, "shortcut save skipped: read-only mode");
            return Err(StoreError::ReadOnlyModeSkip);
        }

        let mut written = self.save_gate.lock();
        if *written >= revision {
            return Ok(());
        }
        match self.store.save(entries) {
            Ok(()) => {
                *written = revision;
                tracing::debug!(revision, count = entries.len(), "shortcut save succeeded");
                Ok(())
            }
            Err(error) => {
                self.read_only.store(true, Ordering::Release);
                tracing::error!(
                    path = %self.store.location().display(),
                    "shortcut save failed, switching to read-only: {error}"
                );
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DocumentStore, VersionedFileStore};
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    struct CountingStore {
        inner: VersionedFileStore<Vec<ShortcutEntry>>,
        saves: AtomicUsize,
        fail_saves: AtomicBool,
    }

    impl CountingStore {
        fn new(path: PathBuf) -> Arc<Self> {
            Arc::new(Self {
                inner: VersionedFileStore::new(path, default_shortcuts),
                saves: AtomicUsize::new(0),
                fail_saves: AtomicBool::new(false),
            })
        }

        fn saves(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    impl DocumentStore<Vec<ShortcutEntry>> for CountingStore {
        fn load_or_create(&self) -> Result<Vec<ShortcutEntry>> {
            self.inner.load_or_create()
        }

        fn save(&self, data: &Vec<ShortcutEntry>) -> Result<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(StoreError::io(
                    self.inner.path(),
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                ));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(data)
        }

        fn location(&self) -> &Path {
            self.inner.path()
        }
    }

    fn open_temp() -> (TempDir, Arc<CountingStore>, ShortcutRegistry) {
        let dir = tempdir().expect("tempdir");
        let store = CountingStore::new(dir.path().join("WebSearchShortcut.json"));
        let registry = ShortcutRegistry::open(store.clone());
        (dir, store, registry)
    }

    fn assert_unique_ids(entries: &[ShortcutEntry]) {
        let ids: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), entries.len());
        assert!(entries.iter().all(|e| !e.id.trim().is_empty()));
    }

    #[test]
    fn new_file_is_seeded_with_unique_ids() {
        let (_dir, store, registry) = open_temp();
        let snapshot = registry.snapshot();

        assert_eq!(snapshot.len(), default_shortcuts().len());
        assert_unique_ids(&snapshot);
        // The default document has blank ids, so the repaired list is saved once.
        assert_eq!(store.saves(), 1);
        assert!(!registry.is_read_only());
    }

    #[test]
    fn duplicate_ids_on_disk_are_repaired_with_one_save() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("WebSearchShortcut.json");
        std::fs::write(
            &path,
            r#"{
                "Version": "0.1.0",
                "LastModified": "2024-05-01T10:00:00Z",
                "Data": [
                    { "Id": "same", "Name": "Google", "Url": "https://www.google.com/search?q=%s" },
                    { "Id": "same", "Name": "Bing", "Url": "https://www.bing.com/search?q=%s" }
                ]
            }"#,
        )
        .expect("write");

        let store = CountingStore::new(path);
        let registry = ShortcutRegistry::open(store.clone());
        let snapshot = registry.snapshot();

        assert_unique_ids(&snapshot);
        assert_eq!(snapshot[0].id, "same");
        assert_eq!(store.saves(), 1);

        let reopened = ShortcutRegistry::open(store.clone());
        assert_eq!(reopened.snapshot(), snapshot);
        assert_eq!(store.saves(), 1);
    }

    #[test]
    fn add_generates_id_and_publishes_after_commit() {
        let (_dir, _store, registry) = open_temp();
        let mut rx = registry.subscribe();

        let added = registry
            .add(ShortcutEntry::new("npm", "https://www.npmjs.com/search?q=%s"))
            .expect("add");
        assert!(!added.id.is_empty());

        let change = rx.try_recv().expect("change");
        assert!(change.before.is_none());
        assert_eq!(change.after.as_ref(), Some(&added));
        // Observers can read back immediately; no lock is held during publish.
        assert_eq!(registry.snapshot().last(), Some(&added));
        assert_unique_ids(&registry.snapshot());
    }

    #[test]
    fn add_with_existing_id_fails_and_leaves_collection_unchanged() {
        let (_dir, store, registry) = open_temp();
        let before = registry.snapshot();
        let saves = store.saves();

        let mut duplicate = ShortcutEntry::new("Other", "https://example.com/?q=%s");
        duplicate.id = before[0].id.clone();
        let err = registry.add(duplicate).expect_err("duplicate");

        assert!(matches!(err, StoreError::DuplicateId(ref id) if *id == before[0].id));
        assert_eq!(registry.snapshot(), before);
        assert_eq!(store.saves(), saves);
    }

    #[test]
    fn update_replaces_in_place() {
        let (_dir, _store, registry) = open_temp();
        let original = registry.snapshot();
        let mut rx = registry.subscribe();

        let mut edited = original[1].clone();
        edited.name = "Bing Images".to_string();
        edited.url = "https://www.bing.com/images/search?q=%s".to_string();
        registry.update(edited.clone()).expect("update");

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), original.len());
        assert_eq!(snapshot[1], edited);
        assert_eq!(snapshot[0], original[0]);

        let change = rx.try_recv().expect("change");
        assert_eq!(change.before, Some(original[1].clone()));
        assert_eq!(change.after, Some(edited));
    }

    #[test]
    fn update_and_remove_unknown_id_fail() {
        let (_dir, _store, registry) = open_temp();
        let mut ghost = ShortcutEntry::new("Ghost", "https://example.com/?q=%s");
        ghost.id = "missing".to_string();

        assert!(matches!(registry.update(ghost), Err(StoreError::NotFound(_))));
        assert!(matches!(registry.remove("missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn remove_persists_and_publishes() {
        let (dir, _store, registry) = open_temp();
        let target = registry.snapshot()[0].clone();
        let mut rx = registry.subscribe();

        let removed = registry.remove(&target.id).expect("remove");
        assert_eq!(removed, target);
        assert!(registry.get(&target.id).is_none());

        let change = rx.try_recv().expect("change");
        assert_eq!(change.before, Some(target.clone()));
        assert!(change.after.is_none());

        let reopened =
            ShortcutRegistry::open(CountingStore::new(dir.path().join("WebSearchShortcut.json")));
        assert!(reopened.get(&target.id).is_none());
        assert_eq!(reopened.len(), registry.len());
    }

    #[test]
    fn snapshot_is_detached_from_live_state() {
        let (_dir, _store, registry) = open_temp();
        let mut snapshot = registry.snapshot();
        snapshot[0].name = "changed".to_string();
        snapshot.clear();

        let again = registry.snapshot();
        assert_eq!(again.len(), default_shortcuts().len());
        assert_eq!(again[0].name, "Google");
        assert_eq!(registry.snapshot(), again);
    }

    #[test]
    fn failed_save_switches_to_read_only() {
        let (_dir, store, registry) = open_temp();
        store.fail_saves.store(true, Ordering::SeqCst);

        registry
            .add(ShortcutEntry::new("First", "https://one.example/?q=%s"))
            .expect("add succeeds in memory");
        assert!(registry.is_read_only());

        store.fail_saves.store(false, Ordering::SeqCst);
        let saves = store.saves();
        registry
            .add(ShortcutEntry::new("Second", "https://two.example/?q=%s"))
            .expect("add succeeds in memory");

        assert_eq!(store.saves(), saves);
        assert_eq!(registry.len(), default_shortcuts().len() + 2);
    }

    #[test]
    fn unreadable_file_starts_read_only_with_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("WebSearchShortcut.json");
        std::fs::write(&path, "[ broken").expect("write");

        let store = CountingStore::new(path.clone());
        let registry = ShortcutRegistry::open(store.clone());

        assert!(registry.is_read_only());
        assert!(registry.load_failure().is_some());
        assert_unique_ids(&registry.snapshot());

        registry
            .add(ShortcutEntry::new("npm", "https://www.npmjs.com/search?q=%s"))
            .expect("add");
        assert_eq!(store.saves(), 0);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "[ broken");
    }

    #[test]
    fn concurrent_adds_keep_ids_unique() {
        let (_dir, _store, registry) = open_temp();
        let registry = Arc::new(registry);
        let initial = registry.len();

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        registry
                            .add(ShortcutEntry::new(
                                format!("worker-{worker}-{i}"),
                                "https://example.com/?q=%s",
                            ))
                            .expect("add");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), initial + 80);
        assert_unique_ids(&snapshot);
    }
}
