use lineage_codec::CodecError;
use lineage_index::IndexError;
use lineage_store::StoreError;
use lineage_types::NodeId;

/// Errors from defining or running a memoized analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The analysis declaration does not fit its result kind.
    #[error("invalid analysis {analysis}: {reason}")]
    Definition {
        analysis: &'static str,
        reason: String,
    },

    /// A declared parameter was not bound.
    #[error("analysis {analysis}: parameter {param:?} is not bound")]
    Unbound {
        analysis: &'static str,
        param: &'static str,
    },

    /// A binding names something that is not a parameter.
    #[error("analysis {analysis}: {name:?} is not a parameter")]
    UnexpectedBinding {
        analysis: &'static str,
        name: String,
    },

    /// More than one stored result matches the arguments.
    #[error("analysis {analysis}: {} stored results match the arguments", .candidates.len())]
    Ambiguous {
        analysis: &'static str,
        candidates: Vec<NodeId>,
    },

    /// A freshly computed result disagrees with the arguments it was
    /// computed from.
    #[error("analysis {analysis}: result {result} has {field} = {actual}, expected {expected}")]
    Inconsistent {
        analysis: &'static str,
        result: NodeId,
        field: &'static str,
        expected: String,
        actual: String,
    },

    /// A bound value has the wrong shape.
    #[error("analysis {analysis}: binding {param:?}: {source}")]
    Binding {
        analysis: &'static str,
        param: &'static str,
        source: CodecError,
    },

    /// Index lookup failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Loading a candidate or checking a result's kind failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result alias for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
