use std::collections::BTreeMap;

use lineage_codec::{
    decode_value, describe, encode_value, pairs_to_value, value_to_pairs, Canonical, CodecError,
    CodecResult, Value,
};

use crate::error::{StoreError, StoreResult};

/// Name of the metadata entry holding the kind tag.
pub const KIND_KEY: &str = "kind";

/// Untyped node metadata: a kind tag plus named field values.
///
/// This is the form metadata takes on disk and while it is being migrated.
/// Typed node kinds convert to and from it through
/// [`Schema`](crate::schema::Schema).
#[derive(Clone, Debug, PartialEq)]
pub struct RawMetadata {
    kind: String,
    fields: BTreeMap<String, Value>,
}

impl RawMetadata {
    /// Create raw metadata from a kind and a field map.
    pub fn new(kind: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            fields,
        }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, name: &str, value: impl Canonical) -> Self {
        self.fields.insert(name.to_string(), value.to_value());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Check that this is metadata of `kind` carrying exactly `expected`.
    pub(crate) fn check_shape(&self, kind: &str, expected: &[&str]) -> StoreResult<()> {
        if self.kind != kind {
            return Err(self.invalid(format!("expected kind {kind:?}")));
        }
        let missing: Vec<&str> = expected
            .iter()
            .copied()
            .filter(|name| !self.fields.contains_key(*name))
            .collect();
        let unexpected: Vec<&str> = self
            .fields
            .keys()
            .map(String::as_str)
            .filter(|name| !expected.contains(name))
            .collect();
        match (missing.is_empty(), unexpected.is_empty()) {
            (true, true) => Ok(()),
            (false, true) => Err(self.invalid(format!("missing fields {missing:?}"))),
            (true, false) => Err(self.invalid(format!("unexpected fields {unexpected:?}"))),
            (false, false) => Err(self.invalid(format!(
                "missing fields {missing:?} and unexpected fields {unexpected:?}"
            ))),
        }
    }

    /// Remove a field and decode it as `T`.
    pub(crate) fn take_field<T: Canonical>(&mut self, name: &str) -> StoreResult<T> {
        let value = self
            .fields
            .remove(name)
            .ok_or_else(|| self.invalid(format!("missing field {name:?}")))?;
        T::from_value(value).map_err(|e| self.invalid(format!("field {name:?}: {e}")))
    }

    fn invalid(&self, reason: String) -> StoreError {
        StoreError::Validation {
            kind: self.kind.clone(),
            reason,
        }
    }

    /// Encode to canonical CBOR bytes.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        if self.fields.contains_key(KIND_KEY) {
            return Err(self.invalid(format!("{KIND_KEY:?} is a reserved field name")));
        }
        Ok(encode_value(&self.to_value())?)
    }

    /// Decode from the front of `input`, leaving the node body behind.
    pub fn decode(input: &mut &[u8]) -> CodecResult<Self> {
        Self::from_value(decode_value(input)?)
    }
}

impl Canonical for RawMetadata {
    fn to_value(&self) -> Value {
        let mut pairs: Vec<(Value, Value)> = self
            .fields
            .iter()
            .map(|(k, v)| (Value::Text(k.clone()), v.clone()))
            .collect();
        pairs.push((Value::Text(KIND_KEY.into()), Value::Text(self.kind.clone())));
        pairs_to_value(pairs)
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        let mut kind = None;
        let mut fields = BTreeMap::new();
        for (key, value) in value_to_pairs(value)? {
            let key = match key {
                Value::Text(key) => key,
                other => {
                    return Err(CodecError::UnexpectedType {
                        expected: "text field name",
                        found: describe(&other),
                    })
                }
            };
            if key == KIND_KEY {
                kind = Some(String::from_value(value)?);
            } else {
                fields.insert(key, value);
            }
        }
        let kind = kind.ok_or_else(|| CodecError::Invalid {
            what: "metadata",
            reason: format!("missing {KIND_KEY:?} entry"),
        })?;
        Ok(Self { kind, fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_types::NodeId;

    fn sample() -> RawMetadata {
        RawMetadata::new("test_result", BTreeMap::new())
            .with("code", NodeId::from_raw([1; 32]))
            .with("exit_code", 0i64)
            .with("cmd", vec!["cargo".to_string(), "test".to_string()])
    }

    #[test]
    fn kind_is_stored_as_a_pair() {
        let raw = sample();
        let pairs = value_to_pairs(raw.to_value()).unwrap();
        let names: Vec<Value> = pairs.into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            names,
            vec![
                Value::Text("cmd".into()),
                Value::Text("code".into()),
                Value::Text("exit_code".into()),
                Value::Text("kind".into()),
            ]
        );
    }

    #[test]
    fn encode_then_decode_leaves_body() {
        let raw = sample();
        let mut bytes = raw.encode().unwrap();
        bytes.extend_from_slice(b"output");
        let mut input = bytes.as_slice();
        let decoded = RawMetadata::decode(&mut input).unwrap();
        assert_eq!(decoded, raw);
        assert_eq!(input, b"output");
    }

    #[test]
    fn reserved_kind_field_is_rejected() {
        let raw = sample().with("kind", "tree".to_string());
        assert!(matches!(raw.encode(), Err(StoreError::Validation { .. })));
    }

    #[test]
    fn missing_kind_is_a_decode_error() {
        let value = pairs_to_value(vec![(Value::Text("a".into()), Value::Bool(true))]);
        assert!(matches!(
            RawMetadata::from_value(value),
            Err(CodecError::Invalid { .. })
        ));
    }

    #[test]
    fn check_shape_reports_both_sides() {
        let raw = sample();
        let err = raw
            .check_shape("test_result", &["code", "exit_code", "stdout"])
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("stdout"), "{msg}");
        assert!(msg.contains("cmd"), "{msg}");
    }

    #[test]
    fn take_field_names_the_field() {
        let mut raw = sample();
        let err = raw.take_field::<String>("exit_code").unwrap_err();
        assert!(err.to_string().contains("exit_code"));
    }
}
