use lineage_codec::CodecError;
use lineage_types::{NodeId, TypeError};

/// Errors from node store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested node was not found.
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// A stored node could not be decoded, migrated, or validated.
    #[error("malformed node {id}: {reason}")]
    Malformed { id: NodeId, reason: String },

    /// Metadata does not match the declared fields of its kind.
    #[error("invalid metadata for kind {kind:?}: {reason}")]
    Validation { kind: String, reason: String },

    /// A tree or crate path is not a normalized relative path.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// A retired kind has no registered migration.
    #[error("unknown node kind {kind:?} (migration chain: {})", .chain.join(" -> "))]
    UnknownKind {
        kind: String,
        /// The kind whose migration produced `kind`, if any.
        migrated_from: Option<String>,
        chain: Vec<String>,
    },

    /// Migrations lead back to a kind already visited.
    #[error("migration cycle: {}", .chain.join(" -> "))]
    MigrationCycle { chain: Vec<String> },

    /// No stored node matches the prefix.
    #[error("no node matches prefix {0:?}")]
    PrefixNotFound(String),

    /// More than one stored node matches the prefix.
    #[error("prefix {prefix:?} is ambiguous ({} candidates)", .candidates.len())]
    AmbiguousPrefix {
        prefix: String,
        candidates: Vec<NodeId>,
    },

    /// The prefix is not valid hex or has the wrong length.
    #[error(transparent)]
    InvalidPrefix(#[from] TypeError),

    /// The node exists but is of a different kind than requested.
    #[error("node {id} is a {actual}, expected {expected}")]
    WrongKind {
        id: NodeId,
        expected: &'static str,
        actual: &'static str,
    },

    /// Canonical encoding failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The node cache lock was poisoned by a panicking thread.
    #[error("node cache lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Reclassify decode and validation failures of a stored node as
    /// [`StoreError::Malformed`]. Other errors pass through.
    pub(crate) fn malformed(self, id: NodeId) -> Self {
        match self {
            Self::Validation { .. } | Self::Codec(_) | Self::InvalidPath { .. } => {
                Self::Malformed {
                    id,
                    reason: self.to_string(),
                }
            }
            other => other,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
