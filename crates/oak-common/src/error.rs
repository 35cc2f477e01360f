//! Error types for OakDB.

use thiserror::Error;

/// Result type alias using OakError.
pub type Result<T> = std::result::Result<T, OakError>;

/// Errors that can occur in OakDB storage operations.
///
/// Key lookups that find nothing are not errors; `get` and `remove`
/// report a missing key as `Ok(None)`.
#[derive(Debug, Error)]
pub enum OakError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Extent store errors
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Storage path already exists: {0}")]
    PathAlreadyExists(String),

    #[error("Storage is not open")]
    NotOpen,

    #[error("Extent out of bounds: {extent_id} (storage holds {size} extents)")]
    OutOfBoundsExtent { extent_id: u64, size: u64 },

    #[error("Out-of-bounds read at extent {extent_id}: {reason}")]
    OutOfBoundsRead { extent_id: u64, reason: String },

    #[error("Out-of-bounds write at extent {extent_id}: {reason}")]
    OutOfBoundsWrite { extent_id: u64, reason: String },

    #[error("Critical storage failure: {0}")]
    CriticalStorage(String),

    // Buffer pool errors
    #[error("Buffer pool exhausted, all frames pinned")]
    PoolExhausted,

    #[error("Extent {0} is not resident in the buffer pool")]
    NotResident(u64),

    #[error("Extent {0} is not pinned")]
    NotPinned(u64),

    #[error("Extent {0} is still pinned")]
    StillPinned(u64),

    // Index errors
    #[error("Corrupted page {extent_id}: {reason}")]
    CorruptedPage { extent_id: u64, reason: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}
