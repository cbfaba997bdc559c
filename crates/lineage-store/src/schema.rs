//! Node kinds.
//!
//! Every kind is a plain struct whose fields are the node's metadata. The
//! [`define_schema!`] macro derives the conversion to and from
//! [`RawMetadata`] plus field-level introspection; [`node_kinds!`] collects
//! the current kinds into the [`Metadata`] enum. Retired kinds use the same
//! macro but are not listed in [`Metadata`] (see [`crate::migrate`]).

use std::collections::BTreeMap;
use std::fmt;

use lineage_codec::Value;
use lineage_types::NodeId;

use crate::error::{StoreError, StoreResult};
use crate::path::RelPath;
use crate::raw::RawMetadata;

/// Static description of a metadata schema.
pub trait Schema: Sized + Clone + fmt::Debug + PartialEq {
    /// Kind tag stored under `"kind"`.
    const KIND: &'static str;

    /// Declared field names, in declaration order.
    const FIELDS: &'static [&'static str];

    /// Convert to untyped metadata.
    fn to_raw(&self) -> RawMetadata;

    /// Convert from untyped metadata. The kind must match and the field set
    /// must be exactly [`Self::FIELDS`].
    fn from_raw(raw: RawMetadata) -> StoreResult<Self>;

    /// Canonical value of one field, or `None` if no such field exists.
    fn field_value(&self, name: &str) -> Option<Value>;

    /// Whether `name` is a field of type [`NodeId`] (not optional).
    fn field_is_node_id(name: &str) -> bool;

    /// Every `(field, referenced id)` pair, at any nesting depth.
    fn field_refs(&self) -> Vec<(&'static str, NodeId)>;
}

/// A kind that can be stored today (has a [`Metadata`] variant).
pub trait NodeKind: Schema + Into<Metadata> {
    /// Downcast from [`Metadata`].
    fn from_metadata(metadata: &Metadata) -> Option<&Self>;
}

/// Declare one or more metadata schemas.
macro_rules! define_schema {
    ($(
        $(#[$meta:meta])*
        pub struct $name:ident = $kind:literal {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    )*) => {$(
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl $crate::schema::Schema for $name {
            const KIND: &'static str = $kind;
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            fn to_raw(&self) -> $crate::raw::RawMetadata {
                #[allow(unused_mut)]
                let mut fields = ::std::collections::BTreeMap::new();
                $(
                    fields.insert(
                        stringify!($field).to_string(),
                        ::lineage_codec::Canonical::to_value(&self.$field),
                    );
                )*
                $crate::raw::RawMetadata::new($kind, fields)
            }

            #[allow(unused_mut)]
            fn from_raw(
                mut raw: $crate::raw::RawMetadata,
            ) -> $crate::error::StoreResult<Self> {
                raw.check_shape($kind, Self::FIELDS)?;
                Ok(Self {
                    $( $field: raw.take_field(stringify!($field))?, )*
                })
            }

            fn field_value(&self, name: &str) -> Option<::lineage_codec::Value> {
                match name {
                    $( stringify!($field) => Some(::lineage_codec::Canonical::to_value(&self.$field)), )*
                    _ => None,
                }
            }

            fn field_is_node_id(name: &str) -> bool {
                match name {
                    $( stringify!($field) => <$ty as ::lineage_codec::Canonical>::IS_NODE_ID, )*
                    _ => false,
                }
            }

            fn field_refs(&self) -> Vec<(&'static str, ::lineage_types::NodeId)> {
                #[allow(unused_mut)]
                let mut out = Vec::new();
                $(
                    for id in ::lineage_codec::CollectRefs::refs(&self.$field) {
                        out.push((stringify!($field), id));
                    }
                )*
                out
            }
        }
    )*};
}

pub(crate) use define_schema;

/// Collect the current kinds into [`Metadata`].
macro_rules! node_kinds {
    ($( $variant:ident($ty:ident) ),* $(,)?) => {
        /// Typed metadata of a node of any current kind.
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub enum Metadata {
            $( $variant($ty), )*
        }

        impl Metadata {
            /// Every current kind tag.
            pub const KINDS: &'static [&'static str] = &[$(<$ty as Schema>::KIND),*];

            /// Kind tag of this metadata.
            pub fn kind(&self) -> &'static str {
                match self {
                    $( Self::$variant(_) => <$ty as Schema>::KIND, )*
                }
            }

            pub fn to_raw(&self) -> RawMetadata {
                match self {
                    $( Self::$variant(m) => m.to_raw(), )*
                }
            }

            /// Decode metadata of a current kind.
            pub fn from_raw(raw: RawMetadata) -> StoreResult<Self> {
                $(
                    if raw.kind() == <$ty as Schema>::KIND {
                        return <$ty as Schema>::from_raw(raw).map(Self::$variant);
                    }
                )*
                Err(StoreError::Validation {
                    kind: raw.kind().to_string(),
                    reason: "not a current node kind".into(),
                })
            }

            pub fn field_value(&self, name: &str) -> Option<Value> {
                match self {
                    $( Self::$variant(m) => m.field_value(name), )*
                }
            }

            pub fn field_refs(&self) -> Vec<(&'static str, NodeId)> {
                match self {
                    $( Self::$variant(m) => m.field_refs(), )*
                }
            }
        }

        $(
            impl From<$ty> for Metadata {
                fn from(m: $ty) -> Self {
                    Self::$variant(m)
                }
            }

            impl NodeKind for $ty {
                fn from_metadata(metadata: &Metadata) -> Option<&Self> {
                    match metadata {
                        Metadata::$variant(m) => Some(m),
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// Returns `true` if `kind` can be stored without migration.
pub fn is_current_kind(kind: &str) -> bool {
    Metadata::KINDS.contains(&kind)
}

// ---------------------------------------------------------------------------
// Current kinds
// ---------------------------------------------------------------------------

define_schema! {
    /// A single file. The body is the file contents.
    pub struct FileNode = "file" {}

    /// A source tree: relative path to file node.
    pub struct TreeNode = "tree" {
        files: BTreeMap<RelPath, NodeId>,
    }

    /// Generation of `compile_commands.json` for a C code tree.
    pub struct CompileCommandsOpNode = "compile_commands_op" {
        c_code: NodeId,
        cmd: Vec<String>,
        exit_code: i64,
        /// Absent when the command failed.
        compile_commands: Option<NodeId>,
    }

    /// C to Rust transpilation.
    pub struct TranspileOpNode = "transpile_op" {
        compile_commands: NodeId,
        c_code: NodeId,
        cmd: Vec<String>,
        exit_code: i64,
        rust_code: Option<NodeId>,
    }

    /// Splitting FFI declarations out of transpiled code.
    pub struct SplitFfiOpNode = "split_ffi_op" {
        old_code: NodeId,
        /// Commit of the splitting tool that was used.
        commit: String,
        exit_code: i64,
        new_code: Option<NodeId>,
    }

    /// One LLM rewrite step. Prompt, request and response are file nodes.
    pub struct LlmOpNode = "llm_op" {
        old_code: NodeId,
        new_code: NodeId,
        raw_prompt: NodeId,
        request: NodeId,
        response: NodeId,
    }

    /// A manual or scripted edit of a code tree.
    pub struct EditOpNode = "edit_op" {
        old_code: NodeId,
        new_code: NodeId,
        reason: String,
    }

    /// Outcome of running tests. The body is the test output.
    pub struct TestResultNode = "test_result_node" {
        code: NodeId,
        /// Tree with code used only for testing, such as a test driver.
        test_code: Option<NodeId>,
        cmd: String,
        exit_code: i64,
    }

    /// Output of the unsafe-code finder. The body is its JSON report.
    pub struct FindUnsafeAnalysisNode = "find_unsafe_analysis" {
        code: NodeId,
        /// Commit of the finder that was used.
        commit: String,
        stderr: String,
    }

    /// One top-level definition. The body is its source text.
    pub struct DefNode = "def" {
        name: String,
        def_kind: String,
    }

    /// A Rust code tree split into named definitions.
    pub struct CrateNode = "crate" {
        code: NodeId,
        defs: BTreeMap<RelPath, NodeId>,
    }
}

node_kinds! {
    File(FileNode),
    Tree(TreeNode),
    CompileCommandsOp(CompileCommandsOpNode),
    TranspileOp(TranspileOpNode),
    SplitFfiOp(SplitFfiOpNode),
    LlmOp(LlmOpNode),
    EditOp(EditOpNode),
    TestResult(TestResultNode),
    FindUnsafeAnalysis(FindUnsafeAnalysisNode),
    Def(DefNode),
    Crate(CrateNode),
}

impl TreeNode {
    /// Build a tree from `(path, file)` pairs.
    pub fn from_entries<I, P>(entries: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = (P, NodeId)>,
        P: AsRef<str>,
    {
        let mut files = BTreeMap::new();
        for (path, id) in entries {
            let path = RelPath::new(path.as_ref())?;
            if files.insert(path.clone(), id).is_some() {
                return Err(StoreError::InvalidPath {
                    path: path.to_string(),
                    reason: "duplicate entry",
                });
            }
        }
        Ok(Self { files })
    }

    pub fn get(&self, path: &str) -> Option<NodeId> {
        self.files.get(path).copied()
    }
}

impl TestResultNode {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_codec::Canonical;

    fn id(byte: u8) -> NodeId {
        NodeId::from_raw([byte; 32])
    }

    #[test]
    fn kinds_are_unique() {
        let mut kinds = Metadata::KINDS.to_vec();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), Metadata::KINDS.len());
    }

    #[test]
    fn field_lists_follow_declaration() {
        assert_eq!(
            TestResultNode::FIELDS,
            &["code", "test_code", "cmd", "exit_code"]
        );
        assert!(FileNode::FIELDS.is_empty());
    }

    #[test]
    fn raw_roundtrip_through_metadata() {
        let op = TranspileOpNode {
            compile_commands: id(1),
            c_code: id(2),
            cmd: vec!["c2rust".into(), "transpile".into()],
            exit_code: 1,
            rust_code: None,
        };
        let raw = op.to_raw();
        assert_eq!(raw.kind(), "transpile_op");
        assert_eq!(raw.get("rust_code"), Some(&Value::Null));
        assert_eq!(Metadata::from_raw(raw).unwrap(), Metadata::TranspileOp(op));
    }

    #[test]
    fn extra_field_is_rejected() {
        let raw = EditOpNode {
            old_code: id(1),
            new_code: id(2),
            reason: "fix".into(),
        }
        .to_raw()
        .with("author", "someone".to_string());
        assert!(matches!(
            Metadata::from_raw(raw),
            Err(StoreError::Validation { .. })
        ));
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let raw = FindUnsafeAnalysisNode {
            code: id(1),
            commit: "abc".into(),
            stderr: String::new(),
        }
        .to_raw()
        .with("commit", 7i64);
        let err = Metadata::from_raw(raw).unwrap_err();
        assert!(err.to_string().contains("commit"), "{err}");
    }

    #[test]
    fn retired_kind_is_not_current() {
        assert!(is_current_kind("test_result_node"));
        assert!(!is_current_kind("test_result"));
        let raw = RawMetadata::new("test_result", BTreeMap::new());
        assert!(Metadata::from_raw(raw).is_err());
    }

    #[test]
    fn field_refs_include_nested_and_optional() {
        let tree = TreeNode::from_entries([("a.rs", id(1)), ("src/b.rs", id(2))]).unwrap();
        assert_eq!(tree.field_refs(), vec![("files", id(1)), ("files", id(2))]);

        let test = TestResultNode {
            code: id(3),
            test_code: Some(id(4)),
            cmd: "cargo test".into(),
            exit_code: 0,
        };
        assert_eq!(test.field_refs(), vec![("code", id(3)), ("test_code", id(4))]);

        let failed = CompileCommandsOpNode {
            c_code: id(5),
            cmd: vec![],
            exit_code: 2,
            compile_commands: None,
        };
        assert_eq!(failed.field_refs(), vec![("c_code", id(5))]);
    }

    #[test]
    fn node_id_fields_are_detected() {
        assert!(TestResultNode::field_is_node_id("code"));
        assert!(!TestResultNode::field_is_node_id("test_code"));
        assert!(!TestResultNode::field_is_node_id("cmd"));
        assert!(!TestResultNode::field_is_node_id("nope"));
    }

    #[test]
    fn field_value_matches_canonical_form() {
        let def = DefNode {
            name: "main".into(),
            def_kind: "fn".into(),
        };
        assert_eq!(def.field_value("name"), Some("main".to_string().to_value()));
        assert_eq!(def.field_value("body"), None);
    }

    #[test]
    fn tree_rejects_bad_paths() {
        assert!(TreeNode::from_entries([("../escape", id(1))]).is_err());
        assert!(TreeNode::from_entries([("dir/", id(1))]).is_err());
    }

    #[test]
    fn tree_lookup_by_str() {
        let tree = TreeNode::from_entries([("src/lib.rs", id(9))]).unwrap();
        assert_eq!(tree.get("src/lib.rs"), Some(id(9)));
        assert_eq!(tree.get("src/main.rs"), None);
    }

    #[test]
    fn passed_follows_exit_code() {
        let mut test = TestResultNode {
            code: id(1),
            test_code: None,
            cmd: "make check".into(),
            exit_code: 0,
        };
        assert!(test.passed());
        test.exit_code = 101;
        assert!(!test.passed());
    }

    #[test]
    fn downcast_through_metadata() {
        let meta: Metadata = FileNode {}.into();
        assert!(FileNode::from_metadata(&meta).is_some());
        assert!(TreeNode::from_metadata(&meta).is_none());
        assert_eq!(meta.kind(), "file");
    }
}
