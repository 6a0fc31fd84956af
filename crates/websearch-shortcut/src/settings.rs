//! User settings and the provider seam the history store reads them through.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Duration;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{Result, StoreError};
use crate::history::RetentionPolicy;
use crate::storage::file::{load_or_create_document, save_document};
use crate::storage::CURRENT_VERSION;

pub const DEFAULT_MAX_DISPLAY_COUNT: usize = 20;
pub const DEFAULT_MAX_HISTORY_DISPLAY_COUNT: usize = 3;

/// Supplies retention and display hints to the history store.
///
/// The store re-reads the policy on `reload` and `refresh_settings`, and
/// before any read or mutation that finds [`HistorySettings::revision`]
/// has moved.
pub trait HistorySettings: Send + Sync {
    fn retention_policy(&self) -> RetentionPolicy;

    /// Change counter, bumped after the provider's values change.
    fn revision(&self) -> u64 {
        0
    }

    fn max_history_display_count(&self) -> usize {
        DEFAULT_MAX_HISTORY_DISPLAY_COUNT
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    pub max_display_count: usize,
    pub max_history_display_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_max_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_max_age_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_display_count: DEFAULT_MAX_DISPLAY_COUNT,
            max_history_display_count: DEFAULT_MAX_HISTORY_DISPLAY_COUNT,
            history_max_count: None,
            history_max_age_secs: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.max_display_count == 0 {
            return Err(StoreError::InvalidInput(
                "max display count must be at least 1".to_string(),
            ));
        }
        if self.history_max_count == Some(0) {
            return Err(StoreError::InvalidInput(
                "history max count must be positive".to_string(),
            ));
        }
        if self.history_max_age_secs == Some(0) {
            return Err(StoreError::InvalidInput(
                "history max age must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        let max_age = self
            .history_max_age_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds);
        RetentionPolicy::from_bounds(self.history_max_count, max_age)
    }
}

/// Fixed in-memory settings, adjustable at runtime.
#[derive(Debug, Default)]
pub struct MemorySettings {
    retention: RwLock<RetentionPolicy>,
    max_history_display_count: RwLock<Option<usize>>,
    revision: AtomicU64,
}

impl MemorySettings {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            retention: RwLock::new(retention),
            max_history_display_count: RwLock::new(None),
            revision: AtomicU64::new(0),
        }
    }

    pub fn set_retention(&self, retention: RetentionPolicy) {
        *self.retention.write() = retention;
        self.revision.fetch_add(1, Ordering::Release);
    }

    pub fn set_max_history_display_count(&self, count: usize) {
        *self.max_history_display_count.write() = Some(count);
        self.revision.fetch_add(1, Ordering::Release);
    }
}

impl HistorySettings for MemorySettings {
    fn retention_policy(&self) -> RetentionPolicy {
        *self.retention.read()
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn max_history_display_count(&self) -> usize {
        (*self.max_history_display_count.read()).unwrap_or(DEFAULT_MAX_HISTORY_DISPLAY_COUNT)
    }
}

/// Settings backed by a versioned JSON file.
///
/// Changes made through [`SettingsManager::update`] are saved and then
/// broadcast to subscribers.
pub struct SettingsManager {
    path: PathBuf,
    current: RwLock<Settings>,
    revision: AtomicU64,
    /// Held across save and swap so the file and `current` agree.
    update_gate: Mutex<()>,
    changes: broadcast::Sender<Settings>,
}

impl std::fmt::Debug for SettingsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsManager")
            .field("path", &self.path)
            .field("current", &*self.current.read())
            .finish()
    }
}

impl SettingsManager {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = load_or_create_document(&path, CURRENT_VERSION, Settings::default)?;
        let settings = match settings.validate() {
            Ok(()) => settings,
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    "invalid settings, using defaults: {error}"
                );
                Settings::default()
            }
        };
        let (changes, _) = broadcast::channel(16);
        Ok(Self {
            path,
            current: RwLock::new(settings),
            revision: AtomicU64::new(0),
            update_gate: Mutex::new(()),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Settings {
        self.current.read().clone()
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let _gate = self.update_gate.lock();
        settings.validate()?;
        save_document(&self.path, CURRENT_VERSION, &settings)?;
        *self.current.write() = settings.clone();
        self.revision.fetch_add(1, Ordering::Release);
        tracing::info!(
            max_display_count = settings.max_display_count,
            max_history_display_count = settings.max_history_display_count,
            "settings updated"
        );
        let _ = self.changes.send(settings);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Settings> {
        self.changes.subscribe()
    }

    pub fn max_display_count(&self) -> usize {
        self.current.read().max_display_count
    }
}

impl HistorySettings for SettingsManager {
    fn retention_policy(&self) -> RetentionPolicy {
        self.current.read().retention_policy()
    }

    fn max_history_display_count(&self) -> usize {
        self.current.read().max_history_display_count
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_defaults_when_missing() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let manager = SettingsManager::open(&path).expect("open");

        assert!(path.exists());
        assert_eq!(manager.settings(), Settings::default());
        assert_eq!(manager.retention_policy(), RetentionPolicy::Unlimited);
        assert_eq!(manager.max_history_display_count(), DEFAULT_MAX_HISTORY_DISPLAY_COUNT);
    }

    #[test]
    fn update_persists_and_notifies() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let manager = SettingsManager::open(&path).expect("open");
        let mut rx = manager.subscribe();

        let settings = Settings {
            history_max_count: Some(10),
            history_max_age_secs: Some(3600),
            ..Settings::default()
        };
        manager.update(settings.clone()).expect("update");

        assert_eq!(rx.try_recv().expect("change"), settings);
        assert_eq!(
            manager.retention_policy(),
            RetentionPolicy::MaxAge(Duration::hours(1))
        );

        let reopened = SettingsManager::open(&path).expect("reopen");
        assert_eq!(reopened.settings(), settings);
    }

    #[test]
    fn invalid_update_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let manager = SettingsManager::open(dir.path().join("settings.json")).expect("open");

        let err = manager
            .update(Settings {
                max_display_count: 0,
                ..Settings::default()
            })
            .expect_err("invalid");
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert_eq!(manager.settings(), Settings::default());
    }

    #[test]
    fn count_bound_maps_to_policy() {
        let settings = Settings {
            history_max_count: Some(2),
            ..Settings::default()
        };
        assert_eq!(settings.retention_policy(), RetentionPolicy::MaxCount(2));
    }

    #[test]
    fn concurrent_updates_all_land() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let manager = SettingsManager::open(&path).expect("open");

        std::thread::scope(|scope| {
            for worker in 1..=8 {
                let manager = &manager;
                scope.spawn(move || {
                    for round in 0..10 {
                        manager
                            .update(Settings {
                                max_display_count: worker * 100 + round,
                                ..Settings::default()
                            })
                            .expect("update");
                    }
                });
            }
        });

        assert_eq!(manager.revision(), 80);
        let reopened = SettingsManager::open(&path).expect("reopen");
        assert_eq!(reopened.settings(), manager.settings());
    }
}
