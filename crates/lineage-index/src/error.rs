//! Error types for the index crate.

use lineage_codec::CodecError;
use lineage_store::StoreError;
use lineage_types::NodeId;

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An index file could not be parsed.
    #[error("corrupt index file for {target}: {reason}")]
    Corrupt { target: NodeId, reason: String },

    /// The `index` stamp does not hold a whole number of node ids.
    #[error("corrupt index stamp: {0} bytes is not a multiple of the id length")]
    CorruptStamp(usize),

    /// Encoding an entry failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error on index files or the lock file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
