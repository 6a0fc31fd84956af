//! Per-shortcut query history with retention and background persistence.

pub mod entry;
pub mod persist;
pub mod retention;
pub mod store;

use std::collections::BTreeMap;

pub use entry::HistoryEntry;
pub use persist::PersistStats;
pub use retention::RetentionPolicy;
pub use store::HistoryStore;

/// Persisted form: shortcut name to entries, newest first.
pub type HistoryData = BTreeMap<String, Vec<HistoryEntry>>;
