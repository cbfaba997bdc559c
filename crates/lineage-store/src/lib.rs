//! Content-addressed node storage for Lineage.
//!
//! Every artifact of a code migration pipeline (source trees, tool
//! invocations, LLM exchanges, test results) is stored as an immutable node
//! identified by the SHA-256 of its canonical metadata and body.
//!
//! # Key Types
//!
//! - [`NodeStore`] -- filesystem store with an in-process LRU cache
//! - [`Node`] -- a loaded node: id, typed [`Metadata`], body
//! - [`Schema`] / [`NodeKind`] -- per-kind metadata structs
//! - [`RawMetadata`] -- untyped metadata as stored on disk
//! - [`Migrations`] -- upgrades records written in retired schemas
//! - [`Stamps`] -- marker files whose mtimes drive incremental indexing
//!
//! # Design Rules
//!
//! 1. Node files are written once and never modified or deleted.
//! 2. The `nodes` stamp is touched before a node file appears.
//! 3. Metadata field sets are checked exactly, on write and on load.
//! 4. Records in retired schemas stay loadable through migrations.

pub mod error;
pub mod migrate;
pub mod node;
pub mod path;
pub mod raw;
pub mod schema;
pub mod stamp;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use migrate::Migrations;
pub use node::Node;
pub use path::RelPath;
pub use raw::RawMetadata;
pub use schema::{
    is_current_kind, CompileCommandsOpNode, CrateNode, DefNode, EditOpNode, FileNode,
    FindUnsafeAnalysisNode, LlmOpNode, Metadata, NodeKind, Schema, SplitFfiOpNode, TestResultNode,
    TranspileOpNode, TreeNode,
};
pub use stamp::{Stamps, NODES_STAMP, UPDATE_LOCK};
pub use store::{NodeStore, DEFAULT_CACHE_CAPACITY};
