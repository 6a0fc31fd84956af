use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::history::{HistoryData, HistoryStore};
use crate::paths::StorePaths;
use crate::settings::{Settings, SettingsManager};
use crate::shortcut::{default_shortcuts, ShortcutRegistry};
use crate::storage::VersionedFileStore;

/// Settings, shortcuts and history opened from one directory.
///
/// Built once at startup; collaborators hold clones of the `Arc` handles.
#[derive(Clone)]
pub struct ShortcutContext {
    pub paths: StorePaths,
    pub settings: Arc<SettingsManager>,
    pub registry: Arc<ShortcutRegistry>,
    pub history: Arc<HistoryStore>,
}

impl fmt::Debug for ShortcutContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ShortcutContext")
            .field("paths", &self.paths)
            .field("read_only", &self.registry.is_read_only())
            .finish()
    }
}

impl ShortcutContext {
    /// Opens every store under `paths`.
    ///
    /// A broken shortcut file leaves the registry read-only; a broken
    /// settings or history file is returned as an error.
    pub fn open(paths: StorePaths) -> Result<Self> {
        let settings = Arc::new(SettingsManager::open(paths.settings_file())?);
        let registry = Arc::new(ShortcutRegistry::open(Arc::new(VersionedFileStore::new(
            paths.shortcuts_file(),
            default_shortcuts,
        ))));
        let history = Arc::new(HistoryStore::open(
            Arc::new(VersionedFileStore::new(paths.history_file(), HistoryData::new)),
            settings.clone(),
        )?);

        tracing::info!(dir = %paths.dir().display(), "shortcut context opened");
        Ok(Self {
            paths,
            settings,
            registry,
            history,
        })
    }

    /// Saves new settings and applies the retention policy to history
    /// immediately.
    ///
    /// Updating through `settings` directly also reaches history, on its
    /// next read or mutation.
    pub fn update_settings(&self, settings: Settings) -> Result<()> {
        self.settings.update(settings)?;
        self.history.refresh_settings();
        Ok(())
    }
}
