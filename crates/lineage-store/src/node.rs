use lineage_types::NodeId;
use serde::de::DeserializeOwned;

use crate::error::{StoreError, StoreResult};
use crate::schema::{Metadata, NodeKind, Schema};

/// An immutable stored node: typed metadata plus an opaque body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    metadata: Metadata,
    body: Vec<u8>,
}

impl Node {
    pub(crate) fn new(id: NodeId, metadata: Metadata, body: Vec<u8>) -> Self {
        Self { id, metadata, body }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        self.metadata.kind()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as UTF-8 text.
    pub fn body_str(&self) -> StoreResult<&str> {
        std::str::from_utf8(&self.body).map_err(|e| StoreError::Malformed {
            id: self.id,
            reason: format!("body is not UTF-8: {e}"),
        })
    }

    /// The body parsed as JSON.
    pub fn body_json<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| StoreError::Malformed {
            id: self.id,
            reason: format!("body is not valid JSON: {e}"),
        })
    }

    /// Typed metadata, if this node is of kind `N`.
    pub fn as_kind<N: NodeKind>(&self) -> Option<&N> {
        N::from_metadata(&self.metadata)
    }

    /// Typed metadata, or [`StoreError::WrongKind`].
    pub fn expect_kind<N: NodeKind>(&self) -> StoreResult<&N> {
        self.as_kind::<N>().ok_or_else(|| StoreError::WrongKind {
            id: self.id,
            expected: <N as Schema>::KIND,
            actual: self.kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DefNode, FileNode, FindUnsafeAnalysisNode};

    fn node(metadata: impl Into<Metadata>, body: &[u8]) -> Node {
        Node::new(NodeId::from_raw([7; 32]), metadata.into(), body.to_vec())
    }

    #[test]
    fn body_views() {
        let n = node(FileNode {}, b"fn main() {}\n");
        assert_eq!(n.body_str().unwrap(), "fn main() {}\n");
        assert!(node(FileNode {}, &[0xff, 0xfe]).body_str().is_err());
    }

    #[test]
    fn body_json_parses_reports() {
        let n = node(
            FindUnsafeAnalysisNode {
                code: NodeId::from_raw([1; 32]),
                commit: "abc123".into(),
                stderr: String::new(),
            },
            br#"{"unsafe_fns": 3}"#,
        );
        let report: serde_json::Value = n.body_json().unwrap();
        assert_eq!(report["unsafe_fns"], 3);
    }

    #[test]
    fn typed_access() {
        let n = node(
            DefNode {
                name: "parse".into(),
                def_kind: "fn".into(),
            },
            b"fn parse() {}",
        );
        assert_eq!(n.kind(), "def");
        assert_eq!(n.as_kind::<DefNode>().unwrap().name, "parse");
        assert!(n.as_kind::<FileNode>().is_none());
        assert!(matches!(
            n.expect_kind::<FileNode>(),
            Err(StoreError::WrongKind {
                expected: "file",
                actual: "def",
                ..
            })
        ));
    }
}
