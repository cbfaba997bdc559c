//! Canonical CBOR values.
//!
//! The canonical form follows three rules:
//!
//! 1. Structs and records encode as arrays (positional) or as sorted
//!    `[key, value]` pair lists, never as CBOR maps.
//! 2. Maps encode as a list of `[key, value]` pairs sorted by the canonical
//!    order of the keys (see [`compare_values`]), so insertion order never
//!    affects the bytes.
//! 3. `None` encodes as CBOR null and a [`NodeId`] as a 32-byte byte string.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use ciborium::value::{Integer, Value};
use lineage_types::NodeId;

use crate::error::{CodecError, CodecResult};

/// A type with a canonical CBOR representation.
pub trait Canonical: Sized {
    /// `true` only for [`NodeId`]. Used to check that a memoized analysis
    /// is keyed on a reference field.
    const IS_NODE_ID: bool = false;

    /// Convert to a canonical value.
    fn to_value(&self) -> Value;

    /// Decode from a canonical value, checking its shape.
    fn from_value(value: Value) -> CodecResult<Self>;
}

/// Short name of a value's CBOR major type, for error messages.
pub fn describe(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "integer",
        Value::Bytes(_) => "bytes",
        Value::Float(_) => "float",
        Value::Text(_) => "text",
        Value::Bool(_) => "bool",
        Value::Null => "null",
        Value::Tag(..) => "tag",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        _ => "unknown",
    }
}

/// Total order on canonically orderable values.
///
/// Integers compare numerically, text and bytes lexicographically, arrays
/// element-wise and then by length. Values of different major types (and
/// maps, tags, NaN floats) are not orderable and yield `None`.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(i128::from(*x).cmp(&i128::from(*y))),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Array(xs), Value::Array(ys)) => {
            for (x, y) in xs.iter().zip(ys) {
                match compare_values(x, y)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(xs.len().cmp(&ys.len()))
        }
        _ => None,
    }
}

/// Sort `[key, value]` pairs by canonical key order and reject duplicates.
///
/// Keys that [`compare_values`] cannot order against each other are
/// rejected, since they have no canonical position.
pub(crate) fn sort_pairs(pairs: &mut [(Value, Value)]) -> CodecResult<()> {
    let mut unorderable = None;
    pairs.sort_by(|(a, _), (b, _)| {
        compare_values(a, b).unwrap_or_else(|| {
            unorderable.get_or_insert((describe(a), describe(b)));
            Ordering::Equal
        })
    });
    if let Some((first, second)) = unorderable {
        return Err(CodecError::UnorderableKeys(first, second));
    }
    for window in pairs.windows(2) {
        if window[0].0 == window[1].0 {
            return Err(CodecError::DuplicateKey);
        }
    }
    Ok(())
}

/// Build a canonical pair list from `(key, value)` pairs.
///
/// The keys must be mutually orderable under [`compare_values`], as keys
/// produced from a single `Ord` type are.
pub fn pairs_to_value(mut pairs: Vec<(Value, Value)>) -> Value {
    pairs.sort_by(|(a, _), (b, _)| {
        let order = compare_values(a, b);
        debug_assert!(
            order.is_some(),
            "map keys of type {} and {} have no canonical order",
            describe(a),
            describe(b)
        );
        order.unwrap_or(Ordering::Equal)
    });
    Value::Array(
        pairs
            .into_iter()
            .map(|(k, v)| Value::Array(vec![k, v]))
            .collect(),
    )
}

/// Split a canonical pair list back into `(key, value)` pairs.
pub fn value_to_pairs(value: Value) -> CodecResult<Vec<(Value, Value)>> {
    let items = expect_array(value, "pair list")?;
    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        let mut pair = expect_array(item, "[key, value] pair")?;
        if pair.len() != 2 {
            return Err(CodecError::WrongArity {
                expected: 2,
                found: pair.len(),
            });
        }
        let v = pair.pop().unwrap_or(Value::Null);
        let k = pair.pop().unwrap_or(Value::Null);
        pairs.push((k, v));
    }
    sort_pairs(&mut pairs)?;
    Ok(pairs)
}

fn expect_array(value: Value, expected: &'static str) -> CodecResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(CodecError::UnexpectedType {
            expected,
            found: describe(&other),
        }),
    }
}

/// Encode a value to CBOR bytes.
pub fn encode_value(value: &Value) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(out)
}

/// Decode one CBOR value from the front of `input`, advancing it past the
/// consumed bytes. Whatever remains (e.g. a node body) is left in `input`.
pub fn decode_value(input: &mut &[u8]) -> CodecResult<Value> {
    ciborium::from_reader::<Value, _>(&mut *input).map_err(|e| CodecError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// Primitive impls
// ---------------------------------------------------------------------------

impl Canonical for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        Ok(value)
    }
}

impl Canonical for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(CodecError::UnexpectedType {
                expected: "bool",
                found: describe(&other),
            }),
        }
    }
}

macro_rules! canonical_int {
    ($($ty:ty),*) => {
        $(
            impl Canonical for $ty {
                fn to_value(&self) -> Value {
                    Value::Integer(Integer::from(*self))
                }

                fn from_value(value: Value) -> CodecResult<Self> {
                    match value {
                        Value::Integer(i) => <$ty>::try_from(i)
                            .map_err(|_| CodecError::IntegerOutOfRange(stringify!($ty))),
                        other => Err(CodecError::UnexpectedType {
                            expected: "integer",
                            found: describe(&other),
                        }),
                    }
                }
            }
        )*
    };
}

canonical_int!(i32, i64, u32, u64);

impl Canonical for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(CodecError::UnexpectedType {
                expected: "text",
                found: describe(&other),
            }),
        }
    }
}

impl Canonical for NodeId {
    const IS_NODE_ID: bool = true;

    fn to_value(&self) -> Value {
        Value::Bytes(self.as_bytes().to_vec())
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Bytes(bytes) => Ok(NodeId::from_slice(&bytes)?),
            other => Err(CodecError::UnexpectedType {
                expected: "node id bytes",
                found: describe(&other),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Container impls
// ---------------------------------------------------------------------------

impl<T: Canonical> Canonical for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(x) => x.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Canonical> Canonical for Vec<T> {
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(Canonical::to_value).collect())
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        expect_array(value, "array")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<K: Canonical + Ord, V: Canonical> Canonical for BTreeMap<K, V> {
    fn to_value(&self) -> Value {
        pairs_to_value(
            self.iter()
                .map(|(k, v)| (k.to_value(), v.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        let mut map = BTreeMap::new();
        for (k, v) in value_to_pairs(value)? {
            if map.insert(K::from_value(k)?, V::from_value(v)?).is_some() {
                return Err(CodecError::DuplicateKey);
            }
        }
        Ok(map)
    }
}

impl<A: Canonical, B: Canonical> Canonical for (A, B) {
    fn to_value(&self) -> Value {
        Value::Array(vec![self.0.to_value(), self.1.to_value()])
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        let mut items = expect_array(value, "pair")?;
        if items.len() != 2 {
            return Err(CodecError::WrongArity {
                expected: 2,
                found: items.len(),
            });
        }
        let b = items.pop().unwrap_or(Value::Null);
        let a = items.pop().unwrap_or(Value::Null);
        Ok((A::from_value(a)?, B::from_value(b)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(byte: u8) -> NodeId {
        NodeId::from_raw([byte; 32])
    }

    #[test]
    fn integers_compare_numerically() {
        let a = 10i64.to_value();
        let b = (-3i64).to_value();
        assert_eq!(compare_values(&a, &b), Some(Ordering::Greater));
    }

    #[test]
    fn mixed_types_are_unorderable() {
        assert_eq!(compare_values(&1i64.to_value(), &"1".to_string().to_value()), None);
        assert_eq!(compare_values(&Value::Map(vec![]), &Value::Map(vec![])), None);
    }

    #[test]
    fn arrays_compare_elementwise_then_length() {
        let short = vec![1i64, 2].to_value();
        let long = vec![1i64, 2, 0].to_value();
        let bigger = vec![1i64, 3].to_value();
        assert_eq!(compare_values(&short, &long), Some(Ordering::Less));
        assert_eq!(compare_values(&bigger, &long), Some(Ordering::Greater));
    }

    #[test]
    fn map_encodes_as_sorted_pairs() {
        let mut files = BTreeMap::new();
        files.insert("src/main.rs".to_string(), id(2));
        files.insert("Cargo.toml".to_string(), id(1));
        let value = files.to_value();
        let pairs = match value {
            Value::Array(items) => items,
            other => panic!("expected array, got {other:?}"),
        };
        assert_eq!(pairs.len(), 2);
        assert_eq!(
            pairs[0],
            Value::Array(vec![Value::Text("Cargo.toml".into()), id(1).to_value()])
        );
    }

    #[test]
    fn map_rejects_duplicate_keys() {
        let value = Value::Array(vec![
            Value::Array(vec![Value::Text("a".into()), 1i64.to_value()]),
            Value::Array(vec![Value::Text("a".into()), 2i64.to_value()]),
        ]);
        let err = BTreeMap::<String, i64>::from_value(value).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateKey));
    }

    #[test]
    fn mixed_key_types_are_rejected() {
        let value = Value::Array(vec![
            Value::Array(vec![Value::Text("a".into()), 1i64.to_value()]),
            Value::Array(vec![7i64.to_value(), 2i64.to_value()]),
        ]);
        let err = value_to_pairs(value).unwrap_err();
        assert!(matches!(err, CodecError::UnorderableKeys(..)));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "no canonical order")]
    fn building_pairs_from_mixed_keys_panics_in_debug() {
        pairs_to_value(vec![
            (Value::Text("a".into()), Value::Null),
            (Value::Bool(true), Value::Null),
        ]);
    }

    #[test]
    fn option_uses_null() {
        assert_eq!(None::<NodeId>.to_value(), Value::Null);
        assert_eq!(Option::<NodeId>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<NodeId>::from_value(id(9).to_value()).unwrap(),
            Some(id(9))
        );
    }

    #[test]
    fn node_id_rejects_short_bytes() {
        let err = NodeId::from_value(Value::Bytes(vec![0; 5])).unwrap_err();
        assert!(matches!(err, CodecError::InvalidNodeId(_)));
    }

    #[test]
    fn wrong_shape_names_expected_type() {
        let err = String::from_value(Value::Bool(true)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnexpectedType {
                expected: "text",
                found: "bool"
            }
        ));
    }

    #[test]
    fn integer_range_is_checked() {
        let err = u32::from_value((-1i64).to_value()).unwrap_err();
        assert!(matches!(err, CodecError::IntegerOutOfRange("u32")));
    }

    #[test]
    fn decode_leaves_trailing_bytes() {
        let mut bytes = encode_value(&vec!["kind".to_string()].to_value()).unwrap();
        bytes.extend_from_slice(b"body bytes");
        let mut input = bytes.as_slice();
        let value = decode_value(&mut input).unwrap();
        assert_eq!(Vec::<String>::from_value(value).unwrap(), vec!["kind"]);
        assert_eq!(input, b"body bytes");
    }

    proptest! {
        #[test]
        fn insertion_order_does_not_change_bytes(
            entries in proptest::collection::btree_map("[a-z/]{1,12}", any::<i64>(), 0..16)
        ) {
            let forward: Vec<(Value, Value)> = entries
                .iter()
                .map(|(k, v)| (k.to_value(), v.to_value()))
                .collect();
            let mut backward = forward.clone();
            backward.reverse();

            let a = encode_value(&pairs_to_value(forward)).unwrap();
            let b = encode_value(&pairs_to_value(backward)).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn btreemap_roundtrip(entries in proptest::collection::btree_map("[a-z]{1,8}", any::<u32>(), 0..16)) {
            let value = entries.to_value();
            let decoded = BTreeMap::<String, u32>::from_value(value).unwrap();
            prop_assert_eq!(decoded, entries);
        }
    }
}
