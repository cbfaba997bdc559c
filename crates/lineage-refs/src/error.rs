//! Error types for tag operations.

use lineage_codec::CodecError;
use thiserror::Error;

/// Errors that can occur during tag operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The tag has never been set.
    #[error("tag not found: {name}")]
    NotFound { name: String },

    /// The tag name is invalid.
    #[error("invalid tag name {name:?}: {reason}")]
    InvalidTagName { name: String, reason: String },

    /// A tag file could not be parsed.
    #[error("corrupt tag {name}: {reason}")]
    Corrupt { name: String, reason: String },

    /// Canonical encoding failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// An in-memory lock was poisoned.
    #[error("lock poisoned")]
    LockPoisoned,

    /// I/O error during file-based tag operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for tag operations.
pub type Result<T> = std::result::Result<T, RefError>;
