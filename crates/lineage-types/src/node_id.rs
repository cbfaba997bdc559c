use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Content-addressed identifier for a stored node.
///
/// A `NodeId` is the SHA-256 digest of a node's canonical metadata followed
/// by its body. Identical content always produces the same `NodeId`, which
/// makes nodes deduplicatable and verifiable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; NodeId::LENGTH]);

impl NodeId {
    /// Digest length in bytes.
    pub const LENGTH: usize = 32;

    /// Length of the full hex form.
    pub const HEX_LENGTH: usize = 2 * Self::LENGTH;

    /// Create a `NodeId` from a pre-computed digest.
    pub const fn from_raw(raw: [u8; Self::LENGTH]) -> Self {
        Self(raw)
    }

    /// Create a `NodeId` from a byte slice, which must be exactly
    /// [`NodeId::LENGTH`] bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let raw: [u8; Self::LENGTH] =
            bytes.try_into().map_err(|_| TypeError::InvalidLength {
                expected: Self::LENGTH,
                actual: bytes.len(),
            })?;
        Ok(Self(raw))
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    /// Full lowercase hex representation (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a full hex string.
    ///
    /// Prefixes are not accepted here; resolving a prefix requires a listing
    /// of the store.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != Self::HEX_LENGTH {
            return Err(TypeError::InvalidLength {
                expected: Self::HEX_LENGTH,
                actual: s.len(),
            });
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Split into the on-disk shard directory name (first byte) and file
    /// name (remaining bytes), both as lowercase hex.
    pub fn shard(&self) -> (String, String) {
        (hex::encode(&self.0[..1]), hex::encode(&self.0[1..]))
    }

    /// Reassemble a `NodeId` from a shard directory name and file name.
    pub fn from_shard(dir: &str, file: &str) -> Result<Self, TypeError> {
        if dir.len() != 2 {
            return Err(TypeError::InvalidLength {
                expected: 2,
                actual: dir.len(),
            });
        }
        Self::from_hex(&format!("{dir}{file}"))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short_hex())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for NodeId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; NodeId::LENGTH]> for NodeId {
    fn from(bytes: [u8; NodeId::LENGTH]) -> Self {
        Self(bytes)
    }
}

impl From<NodeId> for [u8; NodeId::LENGTH] {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

// Binary formats carry the raw digest; human-readable formats carry hex.
impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NodeIdVisitor;

        impl<'de> Visitor<'de> for NodeIdVisitor {
            type Value = NodeId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a {}-byte digest or its hex form", NodeId::LENGTH)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<NodeId, E> {
                NodeId::from_hex(v).map_err(E::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<NodeId, E> {
                NodeId::from_slice(v).map_err(E::custom)
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<NodeId, E> {
                self.visit_bytes(&v)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(NodeIdVisitor)
        } else {
            deserializer.deserialize_bytes(NodeIdVisitor)
        }
    }
}

/// A validated, lowercase hex prefix of a [`NodeId`].
///
/// Prefixes are at least two characters long so that they always select a
/// single shard directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeIdPrefix(String);

impl NodeIdPrefix {
    /// Minimum accepted prefix length.
    pub const MIN_LENGTH: usize = 2;

    /// Parse and normalize a user-supplied prefix.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let lower = s.to_ascii_lowercase();
        if lower.len() < Self::MIN_LENGTH || lower.len() > NodeId::HEX_LENGTH {
            return Err(TypeError::InvalidPrefix {
                prefix: s.to_string(),
                reason: format!(
                    "length must be between {} and {}",
                    Self::MIN_LENGTH,
                    NodeId::HEX_LENGTH
                ),
            });
        }
        if !lower.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidPrefix {
                prefix: s.to_string(),
                reason: "contains non-hex characters".into(),
            });
        }
        Ok(Self(lower))
    }

    /// The shard directory this prefix selects.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }

    /// The part of the prefix that filters file names inside the shard.
    pub fn rest(&self) -> &str {
        &self.0[2..]
    }

    /// Returns `true` if `id` starts with this prefix.
    pub fn matches(&self, id: &NodeId) -> bool {
        id.to_hex().starts_with(&self.0)
    }

    /// The normalized prefix text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeIdPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
