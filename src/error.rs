//! Error types for the index core, built with `thiserror`.
//!
//! Duplicate inserts are not errors; they come back as `InsertOutcome::Duplicate`.

use thiserror::Error;

/// A native file reference that could not be turned into a stored id.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileIdError {
    #[error("file id is not valid base64: {0}")]
    Base64(String),

    #[error("file id is truncated: needed {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("file id ends inside a zero run")]
    DanglingZeroRun,

    #[error("unknown file type {0}")]
    UnknownFileType(i32),

    #[error("web location file ids carry no media id")]
    WebLocation,

    #[error("zero run of {0} bytes does not fit in one length byte")]
    ZeroRunTooLong(usize),
}

/// Failure reported by a single backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend hit its quota. Triggers the overflow fallback on save.
    #[error("storage capacity exhausted: {0}")]
    Capacity(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub fn is_capacity(&self) -> bool {
        matches!(self, StoreError::Capacity(_))
    }
}

/// Errors surfaced by [`Federation`](crate::filedex::Federation) operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot decode file id: {0}")]
    Decode(#[from] FileIdError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type IndexResult<T> = Result<T, IndexError>;
