//! Tags for Lineage.
//!
//! A tag is a human-readable name for a node, such as the latest output of
//! a pipeline stage. Unlike nodes, tags are mutable, but every update is
//! recorded: a tag's full history (its reflog) is kept forever.
//!
//! # Modules
//!
//! - [`error`] -- Error types for tag operations
//! - [`types`] -- [`ReflogEntry`] and its on-disk record format
//! - [`traits`] -- The [`TagStore`] trait defining the storage interface
//! - [`names`] -- Tag name validation
//! - [`fs`] -- [`FsTagStore`], one append-only file per tag
//! - [`memory`] -- In-memory [`InMemoryTagStore`] for tests

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use fs::FsTagStore;
pub use memory::InMemoryTagStore;
pub use names::validate_tag_name;
pub use traits::TagStore;
pub use types::ReflogEntry;
