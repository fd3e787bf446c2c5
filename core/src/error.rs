use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the counting store and its dictionary.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store not found: {0}")]
    StoreNotFound(PathBuf),

    #[error("key not found: {0:?}")]
    KeyNotFound(String),

    #[error("corrupt store at {path}: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("invalid key {0:?}: keys must be non-empty and contain no newline")]
    InvalidKey(String),

    #[error("duplicate key in dictionary source: {0:?}")]
    DuplicateKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dictionary error: {0}")]
    Dictionary(#[from] fst::Error),

    #[error("commit marker error: {0}")]
    Marker(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::CorruptStore { path: path.into(), reason: reason.into() }
    }

    /// Either the store directory or a looked-up key is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::StoreNotFound(_) | StoreError::KeyNotFound(_))
    }
}

/// Keys are written one per line, so they can be neither empty nor span lines.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains('\n') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
