//! Versioned JSON documents and the load/save seam the stores persist through.

pub mod file;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use file::VersionedFileStore;

/// Version stamped on every document this crate writes.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// On-disk envelope: `{ "Version", "LastModified", "Data" }`.
///
/// Only `data` carries meaning. A document without `Data` fails to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionedDocument<T> {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,
    pub data: T,
}

impl<T> VersionedDocument<T> {
    pub fn stamp(version: &str, data: T) -> Self {
        Self {
            version: version.to_string(),
            last_modified: Utc::now(),
            data,
        }
    }
}

fn default_version() -> String {
    "0.0.0".to_string()
}

/// Durable backing for one collection.
///
/// Implementations do no caching; the stores built on top own the
/// in-memory copy.
pub trait DocumentStore<T>: Send + Sync {
    /// Reads the payload, writing the default document first when the file
    /// is missing or blank.
    fn load_or_create(&self) -> Result<T>;
    /// Replaces the whole document with `data`.
    fn save(&self, data: &T) -> Result<()>;
    fn location(&self) -> &Path;
}

pub type SharedDocumentStore<T> = Arc<dyn DocumentStore<T>>;
