use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

pub const APP_DIR_NAME: &str = "WebSearchShortcut";
pub const SHORTCUTS_FILENAME: &str = "WebSearchShortcut.json";
pub const HISTORY_FILENAME: &str = "WebSearchShortcut_history.json";
pub const SETTINGS_FILENAME: &str = "settings.json";

/// Where the shortcut, history and settings documents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    dir: PathBuf,
}

impl StorePaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The per-user configuration directory, e.g.
    /// `~/.config/WebSearchShortcut` on Linux.
    pub fn default_location() -> Result<Self> {
        let base = dirs::config_dir().ok_or_else(|| {
            StoreError::InvalidInput("no configuration directory for this user".to_string())
        })?;
        Ok(Self::new(base.join(APP_DIR_NAME)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn shortcuts_file(&self) -> PathBuf {
        self.dir.join(SHORTCUTS_FILENAME)
    }

    pub fn history_file(&self) -> PathBuf {
        self.dir.join(HISTORY_FILENAME)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILENAME)
    }
}
