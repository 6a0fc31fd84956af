use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::storage::{DocumentStore, VersionedDocument, CURRENT_VERSION};

/// A [`DocumentStore`] backed by one pretty-printed JSON file.
pub struct VersionedFileStore<T> {
    path: PathBuf,
    version: String,
    default: fn() -> T,
}

impl<T> VersionedFileStore<T> {
    pub fn new(path: impl Into<PathBuf>, default: fn() -> T) -> Self {
        Self {
            path: path.into(),
            version: CURRENT_VERSION.to_string(),
            default,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> std::fmt::Debug for VersionedFileStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedFileStore")
            .field("path", &self.path)
            .field("version", &self.version)
            .finish()
    }
}

impl<T> DocumentStore<T> for VersionedFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load_or_create(&self) -> Result<T> {
        load_or_create_document(&self.path, &self.version, self.default)
    }

    fn save(&self, data: &T) -> Result<()> {
        save_document(&self.path, &self.version, data)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// Loads the `Data` payload of the document at `path`.
///
/// A missing or whitespace-only file is first replaced by a document
/// wrapping `default()`. Anything that does not parse as a versioned
/// document is an error; it is never coerced to the default.
pub fn load_or_create_document<T, F>(path: &Path, version: &str, default: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    ensure_parent_dir(path)?;

    let contents = match read_optional(path)? {
        Some(contents) if !contents.trim().is_empty() => contents,
        _ => {
            save_document(path, version, &default())?;
            read_optional(path)?.unwrap_or_default()
        }
    };

    let document: VersionedDocument<T> =
        serde_json::from_str(&contents).map_err(|error| StoreError::parse(path, error.to_string()))?;
    Ok(document.data)
}

/// Writes `data` wrapped in a freshly stamped document.
///
/// The document goes to a sibling temp file first and is renamed over
/// `path`, so readers see either the old or the new document.
pub fn save_document<T: Serialize>(path: &Path, version: &str, data: &T) -> Result<()> {
    ensure_parent_dir(path)?;

    let document = VersionedDocument::stamp(version, data);
    let serialized = serde_json::to_string_pretty(&document)
        .map_err(|error| StoreError::Serialization(error.to_string()))?;

    let temp_path = temp_path_for(path);
    std::fs::write(&temp_path, serialized).map_err(|error| StoreError::io(&temp_path, error))?;
    std::fs::rename(&temp_path, path).map_err(|error| {
        let _ = std::fs::remove_file(&temp_path);
        StoreError::io(path, error)
    })?;
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
        Err(error) => Err(StoreError::io(path, error)),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|error| StoreError::io(parent, error))?;
        }
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
