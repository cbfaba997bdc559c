//! Canonical encoding and hashing for Lineage nodes.
//!
//! Node identity is `SHA-256(canonical-metadata ++ body)`. For that to be
//! stable, metadata must serialize identically regardless of map insertion
//! order; this crate owns that canonical form.
//!
//! - [`Canonical`] -- typed values to/from canonical CBOR [`Value`]s
//! - [`CollectRefs`] -- enumerate every [`NodeId`](lineage_types::NodeId)
//!   embedded in a value, through options, sequences, maps and tuples
//! - [`NodeHasher`] -- SHA-256 digest producing a `NodeId`
//!
//! All crypto operations wrap established libraries.

pub mod canonical;
pub mod error;
pub mod hasher;
pub mod refs;

pub use canonical::{
    compare_values, decode_value, describe, encode_value, pairs_to_value, value_to_pairs, Canonical,
};
pub use ciborium::value::Value;
pub use error::{CodecError, CodecResult};
pub use hasher::NodeHasher;
pub use refs::CollectRefs;
