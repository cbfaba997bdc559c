//! High-level SDK for Lineage.
//!
//! [`Repository`] ties the node store, tags and reverse index together
//! under one root directory and is the main entry point for pipeline
//! drivers. [`RepoConfig`] loads settings from TOML, [`init_logging`]
//! installs a `tracing` subscriber, and [`WorkArea`] materializes trees for
//! external tools and captures their output.

pub mod config;
pub mod error;
pub mod logging;
pub mod repository;
pub mod workarea;

pub use config::{LoggingConfig, RepoConfig};
pub use error::{SdkError, SdkResult};
pub use logging::init_logging;
pub use repository::Repository;
pub use workarea::{WorkArea, WORK_DIR};

// Re-export key types
pub use lineage_analysis::{Analysis, AnalysisError, Bindings};
pub use lineage_index::IndexEntry;
pub use lineage_refs::{ReflogEntry, TagStore};
pub use lineage_store::{Metadata, Node, NodeKind, RelPath, Schema};
pub use lineage_types::NodeId;
