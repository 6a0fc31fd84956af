//! Web search shortcuts and their query history.
//!
//! Both collections are held in memory as the authoritative copy and
//! mirrored to versioned JSON documents:
//! - [`ShortcutRegistry`]: shortcut records with stable unique ids and
//!   change notification
//! - [`HistoryStore`]: per-shortcut query history with retention pruning
//!   and background saves
//! - [`storage`]: the `{ Version, LastModified, Data }` document contract

pub mod browser;
pub mod bus;
pub mod context;
pub mod error;
pub mod history;
pub mod paths;
pub mod settings;
pub mod shortcut;
pub mod storage;

pub use browser::{BrowserCatalog, BrowserExecutionInfo, BrowserInfo};
pub use bus::{ShortcutBus, ShortcutChange};
pub use context::ShortcutContext;
pub use error::{Result, StoreError};
pub use history::{HistoryData, HistoryEntry, HistoryStore, RetentionPolicy};
pub use paths::StorePaths;
pub use settings::{HistorySettings, MemorySettings, Settings, SettingsManager};
pub use shortcut::{ShortcutEntry, ShortcutRegistry};
pub use storage::{DocumentStore, SharedDocumentStore, VersionedDocument, VersionedFileStore};
