//! Walking values for embedded node references.
//!
//! The reverse index needs every [`NodeId`] a node's metadata mentions, at
//! any depth. Each metadata type says explicitly where its references live.

use std::collections::BTreeMap;

use ciborium::value::Value;
use lineage_types::NodeId;

/// Enumerate every [`NodeId`] embedded in a value.
pub trait CollectRefs {
    /// Push each embedded reference onto `out`, in traversal order.
    fn collect_refs(&self, out: &mut Vec<NodeId>);

    /// Convenience wrapper returning the references as a new vector.
    fn refs(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }
}

macro_rules! no_refs {
    ($($ty:ty),*) => {
        $(
            impl CollectRefs for $ty {
                fn collect_refs(&self, _out: &mut Vec<NodeId>) {}
            }
        )*
    };
}

no_refs!(bool, i32, i64, u32, u64, String);

// Raw values carry no type information; a 32-byte string is not
// necessarily a reference.
no_refs!(Value);

impl CollectRefs for NodeId {
    fn collect_refs(&self, out: &mut Vec<NodeId>) {
        out.push(*self);
    }
}

impl<T: CollectRefs> CollectRefs for Option<T> {
    fn collect_refs(&self, out: &mut Vec<NodeId>) {
        if let Some(x) = self {
            x.collect_refs(out);
        }
    }
}

impl<T: CollectRefs> CollectRefs for Vec<T> {
    fn collect_refs(&self, out: &mut Vec<NodeId>) {
        for x in self {
            x.collect_refs(out);
        }
    }
}

impl<K: CollectRefs, V: CollectRefs> CollectRefs for BTreeMap<K, V> {
    fn collect_refs(&self, out: &mut Vec<NodeId>) {
        for (k, v) in self {
            k.collect_refs(out);
            v.collect_refs(out);
        }
    }
}

impl<A: CollectRefs, B: CollectRefs> CollectRefs for (A, B) {
    fn collect_refs(&self, out: &mut Vec<NodeId>) {
        self.0.collect_refs(out);
        self.1.collect_refs(out);
    }
}
