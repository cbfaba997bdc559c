use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("work area {0} is already in use")]
    WorkAreaBusy(PathBuf),

    #[error("{path} is outside the work area")]
    OutsideWorkArea { path: PathBuf },

    #[error("{0} already exists in the work area")]
    PathExists(PathBuf),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("no node, tag or id prefix matches {0:?}")]
    Unresolved(String),

    #[error("store error: {0}")]
    Store(#[from] lineage_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] lineage_refs::RefError),

    #[error("index error: {0}")]
    Index(#[from] lineage_index::IndexError),

    #[error("analysis error: {0}")]
    Analysis(#[from] lineage_analysis::AnalysisError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
