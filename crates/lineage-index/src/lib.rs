//! Reverse-reference index for Lineage.
//!
//! Nodes refer to other nodes through their metadata (a test result names
//! the code it tested, an LLM step names its input and output trees). This
//! crate answers the opposite question: which nodes refer to a given node,
//! and through which field?
//!
//! The index is derived data. It is brought up to date lazily on each query
//! and can be rebuilt from the store at any time.
//!
//! # Key Types
//!
//! - [`ReverseIndex`] -- query, incremental update, rebuild
//! - [`IndexEntry`] -- `(source, kind, key)` reference record
//! - [`UpdateStats`] -- counters from one update

pub mod entry;
pub mod error;
pub mod index;

pub use entry::IndexEntry;
pub use error::{IndexError, IndexResult};
pub use index::{ReverseIndex, UpdateStats, INDEX_STAMP};
