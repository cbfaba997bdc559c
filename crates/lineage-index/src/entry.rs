//! Reverse-index entries.

use lineage_codec::{describe, Canonical, CodecError, CodecResult, Value};
use lineage_types::NodeId;

/// A reference to some target node: `source` mentions the target in its
/// metadata field `key`.
///
/// Entries are stored under the target's id as `cbor([source, kind, key])`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    /// The referring node.
    pub source: NodeId,
    /// Kind of the referring node.
    pub kind: String,
    /// Metadata field of the referring node that holds the reference.
    pub key: String,
}

impl IndexEntry {
    pub fn new(source: NodeId, kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            source,
            kind: kind.into(),
            key: key.into(),
        }
    }
}

impl Canonical for IndexEntry {
    fn to_value(&self) -> Value {
        Value::Array(vec![
            self.source.to_value(),
            self.kind.to_value(),
            self.key.to_value(),
        ])
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(CodecError::UnexpectedType {
                    expected: "index entry array",
                    found: describe(&other),
                })
            }
        };
        let [source, kind, key]: [Value; 3] =
            items
                .try_into()
                .map_err(|items: Vec<Value>| CodecError::WrongArity {
                    expected: 3,
                    found: items.len(),
                })?;
        Ok(Self {
            source: NodeId::from_value(source)?,
            kind: String::from_value(kind)?,
            key: String::from_value(key)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_as_three_element_array() {
        let entry = IndexEntry::new(NodeId::from_raw([2; 32]), "tree", "files");
        match entry.to_value() {
            Value::Array(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], Value::Bytes(vec![2; 32]));
                assert_eq!(items[2], Value::Text("files".into()));
            }
            other => panic!("expected array, got {other:?}"),
        }
        assert_eq!(IndexEntry::from_value(entry.to_value()).unwrap(), entry);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let value = Value::Array(vec![NodeId::from_raw([1; 32]).to_value()]);
        assert!(matches!(
            IndexEntry::from_value(value),
            Err(CodecError::WrongArity {
                expected: 3,
                found: 1
            })
        ));
    }
}
