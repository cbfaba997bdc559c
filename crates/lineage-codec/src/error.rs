use lineage_types::TypeError;

/// Errors from canonical encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Writing CBOR bytes failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// The input is not well-formed CBOR.
    #[error("decode error: {0}")]
    Decode(String),

    /// A value had a different shape than the declared type.
    #[error("expected {expected}, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    /// An integer does not fit the declared integer type.
    #[error("integer out of range for {0}")]
    IntegerOutOfRange(&'static str),

    /// A tuple or pair had the wrong number of elements.
    #[error("expected {expected} elements, found {found}")]
    WrongArity { expected: usize, found: usize },

    /// A canonical map contained the same key twice.
    #[error("duplicate map key")]
    DuplicateKey,

    /// Two map keys have no canonical order between them.
    #[error("map keys of type {0} and {1} have no canonical order")]
    UnorderableKeys(&'static str, &'static str),

    /// A value had the right shape but failed a domain check.
    #[error("invalid {what}: {reason}")]
    Invalid { what: &'static str, reason: String },

    /// A byte string could not be read as a node identifier.
    #[error("invalid node id: {0}")]
    InvalidNodeId(#[from] TypeError),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
