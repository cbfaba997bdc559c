use lineage_types::NodeId;
use sha2::{Digest, Sha256};

/// SHA-256 node hasher.
///
/// A node's identity is the digest of its canonical metadata bytes followed
/// by its body bytes. The kind tag lives inside the metadata, so two nodes of
/// different kinds never share an id even when their bodies are equal; no
/// separate domain prefix is needed.
#[derive(Clone, Default)]
pub struct NodeHasher {
    inner: Sha256,
}

impl NodeHasher {
    /// Create an empty hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish and return the `NodeId`.
    pub fn finalize(self) -> NodeId {
        NodeId::from_raw(self.inner.finalize().into())
    }

    /// Hash an encoded metadata block and a body in one call.
    pub fn node_id(metadata: &[u8], body: &[u8]) -> NodeId {
        let mut hasher = Self::new();
        hasher.update(metadata);
        hasher.update(body);
        hasher.finalize()
    }

    /// Verify that a node file's contents produce the expected id.
    pub fn verify(contents: &[u8], expected: &NodeId) -> bool {
        Self::node_id(contents, &[]) == *expected
    }
}

impl std::fmt::Debug for NodeHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHasher").finish_non_exhaustive()
    }
}
