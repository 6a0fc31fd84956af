use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shortcut with id '{0}' already exists")]
    DuplicateId(String),

    #[error("Shortcut with id '{0}' was not found")]
    NotFound(String),

    #[error("Save skipped: store is in read-only mode")]
    ReadOnlyModeSkip,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Background worker error: {0}")]
    Worker(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn parse(path: &Path, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_mentions_path() {
        let err = StoreError::io(
            Path::new("/tmp/shortcuts.json"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/shortcuts.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn duplicate_id_message() {
        let err = StoreError::DuplicateId("abc".to_string());
        assert_eq!(err.to_string(), "Shortcut with id 'abc' already exists");
    }
}
