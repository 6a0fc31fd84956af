use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use super::persist::{PersistStats, PersistWorker};
use super::{HistoryData, HistoryEntry, RetentionPolicy};
use crate::error::Result;
use crate::settings::HistorySettings;
use crate::storage::SharedDocumentStore;

/// Query history for every shortcut, keyed case-insensitively by name.
///
/// Reads are served from a per-shortcut cache of distinct queries, newest
/// first, rebuilt under the same lock as every mutation so it is never
/// observed half-updated. Saves are handed to a background writer.
pub struct HistoryStore {
    state: Mutex<HistoryState>,
    settings: Arc<dyn HistorySettings>,
    persist: PersistWorker,
}

#[derive(Default)]
struct HistoryState {
    buckets: HashMap<String, HistoryBucket>,
    cache: HashMap<String, Vec<String>>,
    policy: RetentionPolicy,
    /// Provider revision `policy` was read at.
    settings_revision: u64,
    /// Bumped by every mutation that schedules a save.
    generation: u64,
}

/// Entries for one shortcut, under the name they were first recorded with.
struct HistoryBucket {
    name: String,
    entries: Vec<HistoryEntry>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("location", &self.persist.location())
            .field("policy", &self.state.lock().policy)
            .finish()
    }
}

fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

fn sort_newest_first(entries: &mut [HistoryEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

fn distinct_queries(entries: &[HistoryEntry]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .iter()
        .filter(|entry| seen.insert(entry.query.to_lowercase()))
        .map(|entry| entry.query.clone())
        .collect()
}

impl HistoryState {
    fn rebuild_cache_entry(&mut self, key: &str) {
        match self.buckets.get(key) {
            Some(bucket) if !bucket.entries.is_empty() => {
                self.cache
                    .insert(key.to_string(), distinct_queries(&bucket.entries));
            }
            _ => {
                self.cache.remove(key);
            }
        }
    }

    fn rebuild_cache(&mut self) {
        self.cache = self
            .buckets
            .iter()
            .filter(|(_, bucket)| !bucket.entries.is_empty())
            .map(|(key, bucket)| (key.clone(), distinct_queries(&bucket.entries)))
            .collect();
    }

    fn snapshot(&self) -> HistoryData {
        self.buckets
            .values()
            .filter(|bucket| !bucket.entries.is_empty())
            .map(|bucket| (bucket.name.clone(), bucket.entries.clone()))
            .collect()
    }
}

/// Groups persisted entries by folded name. Returns whether two stored
/// names collapsed into one bucket.
fn buckets_from_data(data: HistoryData) -> (HashMap<String, HistoryBucket>, bool) {
    let mut buckets: HashMap<String, HistoryBucket> = HashMap::with_capacity(data.len());
    let mut merged = false;
    for (name, entries) in data {
        let key = fold_name(&name);
        match buckets.get_mut(&key) {
            Some(bucket) => {
                bucket.entries.extend(entries);
                merged = true;
            }
            None => {
                buckets.insert(key, HistoryBucket { name, entries });
            }
        }
    }
    for bucket in buckets.values_mut() {
        sort_newest_first(&mut bucket.entries);
    }
    (buckets, merged)
}

impl HistoryStore {
    /// Re-reads the retention policy if the provider changed since it was
    /// last read.
    fn sync_policy(&self, state: &mut HistoryState) {
        let revision = self.settings.revision();
        if revision != state.settings_revision {
            state.settings_revision = revision;
            state.policy = self.settings.retention_policy();
            tracing::debug!(policy = ?state.policy, "history retention policy changed");
        }
    }

    /// Loads history from `store`, applying the provider's retention policy.
    ///
    /// Fails if the document cannot be read or parsed.
    pub fn open(
        store: SharedDocumentStore<HistoryData>,
        settings: Arc<dyn HistorySettings>,
    ) -> Result<Self> {
        let history = Self {
            state: Mutex::new(HistoryState::default()),
            settings,
            persist: PersistWorker::spawn(store)?,
        };
        history.reload()?;
        Ok(history)
    }

    /// Distinct queries for `shortcut_name`, newest first.
    ///
    /// Entries that no longer satisfy the retention policy are pruned here
    /// and a save is scheduled before the list is returned.
    pub fn get(&self, shortcut_name: &str) -> Vec<String> {
        let key = fold_name(shortcut_name);
        let mut guard = self.state.lock();
        let state = &mut *guard;
        self.sync_policy(state);
        let now = Utc::now();

        let policy = state.policy;
        let pruned = match state.buckets.get_mut(&key) {
            Some(bucket) if policy.is_violated_by(&bucket.entries, now) => {
                policy.apply(&mut bucket.entries, now)
            }
            _ => 0,
        };
        if pruned > 0 {
            state.rebuild_cache_entry(&key);
            state.generation += 1;
            self.persist.schedule(state.snapshot());
            tracing::debug!(shortcut = shortcut_name, pruned, "pruned history on read");
        }

        state.cache.get(&key).cloned().unwrap_or_default()
    }

    /// Cached queries starting with `prefix`, ignoring case.
    pub fn search_cache(&self, shortcut_name: &str, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        let state = self.state.lock();
        state
            .cache
            .get(&fold_name(shortcut_name))
            .map(|queries| {
                queries
                    .iter()
                    .filter(|query| query.to_lowercase().starts_with(&prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// [`HistoryStore::search_cache`] capped at the display count hint.
    pub fn suggestions(&self, shortcut_name: &str, prefix: &str) -> Vec<String> {
        let mut matches = self.search_cache(shortcut_name, prefix);
        matches.truncate(self.settings.max_history_display_count());
        matches
    }

    /// Raw entries for `shortcut_name`, newest first.
    pub fn entries(&self, shortcut_name: &str) -> Vec<HistoryEntry> {
        self.state
            .lock()
            .buckets
            .get(&fold_name(shortcut_name))
            .map(|bucket| bucket.entries.clone())
            .unwrap_or_default()
    }

    pub fn add(&self, shortcut_name: &str, query: &str) {
        self.add_entry(shortcut_name, HistoryEntry::new(query));
    }

    /// Records `entry`, keeping the list ordered by timestamp even when the
    /// entry's clock disagrees with the ones already stored.
    pub fn add_entry(&self, shortcut_name: &str, entry: HistoryEntry) {
        let key = fold_name(shortcut_name);
        let query = entry.query.clone();
        let pruned = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            self.sync_policy(state);
            let bucket = state
                .buckets
                .entry(key.clone())
                .or_insert_with(|| HistoryBucket {
                    name: shortcut_name.to_string(),
                    entries: Vec::new(),
                });
            bucket.entries.insert(0, entry);
            sort_newest_first(&mut bucket.entries);
            let pruned = state.policy.apply(&mut bucket.entries, Utc::now());

            state.rebuild_cache_entry(&key);
            state.generation += 1;
            self.persist.schedule(state.snapshot());
            pruned
        };

        tracing::info!(shortcut = shortcut_name, query = %query, pruned, "recorded history query");
    }

    /// Drops every entry whose query equals `query` exactly.
    pub fn remove(&self, shortcut_name: &str, query: &str) {
        let key = fold_name(shortcut_name);
        let removed = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(bucket) = state.buckets.get_mut(&key) else {
                return;
            };
            let before = bucket.entries.len();
            bucket.entries.retain(|entry| entry.query != query);
            let removed = before - bucket.entries.len();
            if removed > 0 {
                state.rebuild_cache_entry(&key);
                state.generation += 1;
                self.persist.schedule(state.snapshot());
            }
            removed
        };

        tracing::info!(shortcut = shortcut_name, query = %query, removed, "removed history query");
    }

    pub fn remove_all(&self, shortcut_name: &str) {
        let key = fold_name(shortcut_name);
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.buckets.remove(&key).is_none() {
                return;
            }
            state.rebuild_cache_entry(&key);
            state.generation += 1;
            self.persist.schedule(state.snapshot());
        }

        tracing::info!(shortcut = shortcut_name, "cleared history");
    }

    /// Replaces the in-memory history with the stored document.
    ///
    /// The retention policy is re-read and enforced on every shortcut; if
    /// anything was trimmed the result is saved. On failure the current
    /// state is kept and the error returned.
    ///
    /// The file is read without holding the state lock. If a mutation lands
    /// in the meantime the read is stale and the reload starts over once
    /// that mutation's save has been written.
    pub fn reload(&self) -> Result<()> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let generation = self.state.lock().generation;
            self.persist.wait_idle();
            let data = match self.persist.load() {
                Ok(data) => data,
                Err(error) => {
                    tracing::error!(
                        path = %self.persist.location().display(),
                        "history reload failed: {error}"
                    );
                    return Err(error);
                }
            };

            let revision = self.settings.revision();
            let policy = self.settings.retention_policy();
            let now = Utc::now();
            let (mut buckets, merged) = buckets_from_data(data);
            let trimmed: usize = buckets
                .values_mut()
                .map(|bucket| policy.apply(&mut bucket.entries, now))
                .sum();

            let shortcuts = buckets.len();
            {
                let mut state = self.state.lock();
                if state.generation != generation {
                    tracing::debug!(attempts, "history changed during reload, retrying");
                    continue;
                }
                state.buckets = buckets;
                state.policy = policy;
                state.settings_revision = revision;
                state.rebuild_cache();
                if trimmed > 0 || merged {
                    self.persist.schedule(state.snapshot());
                }
            }

            tracing::info!(shortcuts, trimmed, attempts, ?policy, "history reloaded");
            return Ok(());
        }
    }

    /// Picks up a changed retention policy without touching stored entries.
    ///
    /// Shortcuts are trimmed the next time they are read or mutated.
    pub fn refresh_settings(&self) {
        let revision = self.settings.revision();
        let policy = self.settings.retention_policy();
        let mut state = self.state.lock();
        state.settings_revision = revision;
        state.policy = policy;
        tracing::debug!(?policy, "history retention policy refreshed");
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        let mut state = self.state.lock();
        self.sync_policy(&mut state);
        state.policy
    }

    /// Shortcut names with recorded history, as first recorded.
    pub fn shortcut_names(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<String> = state
            .buckets
            .values()
            .filter(|bucket| !bucket.entries.is_empty())
            .map(|bucket| bucket.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Blocks until every scheduled save has been written or has failed.
    pub fn flush(&self) {
        self.persist.wait_idle();
    }

    pub fn persist_stats(&self) -> PersistStats {
        self.persist.stats()
    }
}
