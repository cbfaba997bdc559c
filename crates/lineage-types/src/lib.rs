//! Foundation types for Lineage.
//!
//! Lineage records every artifact and every transformation step of a code
//! migration pipeline as an immutable, content-addressed node. This crate
//! holds the identifier shared by every other Lineage crate.
//!
//! # Key Types
//!
//! - [`NodeId`] -- SHA-256 digest identifying a node
//! - [`TypeError`] -- parse/format failures for identifiers

pub mod error;
pub mod node_id;

pub use error::TypeError;
pub use node_id::{NodeId, NodeIdPrefix};
