use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use lineage_codec::{Canonical, Value};
use lineage_index::ReverseIndex;
use lineage_store::{Node, NodeKind, Schema};
use lineage_types::NodeId;
use tracing::{debug, info};

use crate::error::{AnalysisError, AnalysisResult};

/// Argument values for one analysis run, by parameter name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a parameter, replacing any previous value.
    pub fn bind(mut self, name: &str, value: impl Canonical) -> Self {
        self.values.insert(name.to_string(), value.to_value());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// A deterministic computation whose result is stored as a node of kind `N`.
///
/// The parameters of an analysis are fields of `N`. One of them, the key, is
/// a [`NodeId`] field: previous results are found by asking the reverse
/// index which `N` nodes refer to the key through that field, then keeping
/// the ones whose other parameter fields equal the arguments.
///
/// ```ignore
/// let tests = Analysis::<TestResultNode>::new("run_tests", "code", &["code", "test_code", "cmd"])?;
/// let result = tests.run(&index, &args, || run_tests_in_sandbox(&store, code, cmd))?;
/// ```
pub struct Analysis<N> {
    name: &'static str,
    key_field: &'static str,
    params: Vec<&'static str>,
    _kind: PhantomData<fn() -> N>,
}

impl<N: NodeKind> Analysis<N> {
    /// Declare an analysis.
    ///
    /// Every parameter must be a field of `N`, and `key_field` must be one
    /// of the parameters with type [`NodeId`].
    pub fn new(
        name: &'static str,
        key_field: &'static str,
        params: &[&'static str],
    ) -> AnalysisResult<Self> {
        let invalid = |reason: String| AnalysisError::Definition {
            analysis: name,
            reason,
        };
        let mut seen = BTreeSet::new();
        for param in params {
            if !N::FIELDS.contains(param) {
                return Err(invalid(format!(
                    "{param:?} is not a field of {}",
                    <N as Schema>::KIND
                )));
            }
            if !seen.insert(*param) {
                return Err(invalid(format!("{param:?} is declared twice")));
            }
        }
        if !seen.contains(key_field) {
            return Err(invalid(format!("key {key_field:?} is not a parameter")));
        }
        if !N::field_is_node_id(key_field) {
            return Err(invalid(format!("key {key_field:?} is not a node id field")));
        }
        Ok(Self {
            name,
            key_field,
            params: params.to_vec(),
            _kind: PhantomData,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key_field(&self) -> &'static str {
        self.key_field
    }

    pub fn params(&self) -> &[&'static str] {
        &self.params
    }

    /// Return the stored result for `args`, running `compute` only if there
    /// is none.
    ///
    /// A freshly computed result must be of kind `N` and agree with `args`
    /// on every parameter field. Two or more stored matches are an error.
    pub fn run<E, F>(&self, index: &ReverseIndex, args: &Bindings, compute: F) -> Result<Arc<Node>, E>
    where
        E: From<AnalysisError>,
        F: FnOnce() -> Result<Arc<Node>, E>,
    {
        let mut found = self.lookup(index, args)?;
        match found.len() {
            0 => {
                info!(analysis = self.name, "no stored result, running");
                let node = compute()?;
                self.check_result(&node, args)?;
                Ok(node)
            }
            1 => {
                let node = found.remove(0);
                debug!(analysis = self.name, id = %node.id(), "found stored result");
                Ok(node)
            }
            _ => Err(AnalysisError::Ambiguous {
                analysis: self.name,
                candidates: found.iter().map(|n| n.id()).collect(),
            }
            .into()),
        }
    }

    /// Every stored result matching `args`.
    pub fn lookup(&self, index: &ReverseIndex, args: &Bindings) -> AnalysisResult<Vec<Arc<Node>>> {
        self.check_bindings(args)?;
        let key = self.key(args)?;

        let mut seen = BTreeSet::new();
        let mut found = Vec::new();
        for entry in index.query(&key)? {
            if entry.kind != <N as Schema>::KIND || entry.key != self.key_field {
                continue;
            }
            if !seen.insert(entry.source) {
                continue;
            }
            let node = index.store().get(&entry.source)?;
            let result = node.expect_kind::<N>()?;
            if self.first_mismatch(result, args).is_none() {
                found.push(node);
            }
        }
        Ok(found)
    }

    fn check_bindings(&self, args: &Bindings) -> AnalysisResult<()> {
        if let Some(param) = self.params.iter().copied().find(|p| args.get(p).is_none()) {
            return Err(AnalysisError::Unbound {
                analysis: self.name,
                param,
            });
        }
        if let Some(name) = args
            .values
            .keys()
            .find(|name| !self.params.iter().any(|p| *p == name.as_str()))
        {
            return Err(AnalysisError::UnexpectedBinding {
                analysis: self.name,
                name: name.clone(),
            });
        }
        Ok(())
    }

    fn key(&self, args: &Bindings) -> AnalysisResult<NodeId> {
        let value = args.get(self.key_field).cloned().unwrap_or(Value::Null);
        NodeId::from_value(value).map_err(|source| AnalysisError::Binding {
            analysis: self.name,
            param: self.key_field,
            source,
        })
    }

    /// The first parameter whose stored value differs from its argument.
    fn first_mismatch(&self, result: &N, args: &Bindings) -> Option<(&'static str, Option<Value>)> {
        self.params.iter().find_map(|param| {
            let stored = result.field_value(param);
            if stored.as_ref() == args.get(param) {
                None
            } else {
                Some((*param, stored))
            }
        })
    }

    fn check_result(&self, node: &Node, args: &Bindings) -> AnalysisResult<()> {
        let result = node.expect_kind::<N>()?;
        match self.first_mismatch(result, args) {
            None => Ok(()),
            Some((field, actual)) => Err(AnalysisError::Inconsistent {
                analysis: self.name,
                result: node.id(),
                field,
                expected: format!("{:?}", args.get(field)),
                actual: format!("{actual:?}"),
            }),
        }
    }
}

impl<N> fmt::Debug for Analysis<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analysis")
            .field("name", &self.name)
            .field("key_field", &self.key_field)
            .field("params", &self.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use lineage_store::{
        FileNode, FindUnsafeAnalysisNode, NodeStore, StoreError, TestResultNode, TreeNode,
    };

    #[derive(Debug, thiserror::Error)]
    enum RunError {
        #[error(transparent)]
        Analysis(#[from] AnalysisError),
        #[error(transparent)]
        Store(#[from] StoreError),
        #[error("tool failed: {0}")]
        Tool(String),
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<NodeStore>,
        index: ReverseIndex,
        code: NodeId,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(NodeStore::open(dir.path()).unwrap());
        let index = ReverseIndex::new(Arc::clone(&store));
        let main = store.create(FileNode {}, "fn main() {}").unwrap().id();
        let tree = TreeNode::from_entries([("src/main.rs", main)]).unwrap();
        let code = store.create(tree, "").unwrap().id();
        Fixture {
            _dir: dir,
            store,
            index,
            code,
        }
    }

    fn run_tests() -> Analysis<TestResultNode> {
        Analysis::new("run_tests", "code", &["code", "test_code", "cmd"]).unwrap()
    }

    fn args(code: NodeId, cmd: &str) -> Bindings {
        Bindings::new()
            .bind("code", code)
            .bind("test_code", None::<NodeId>)
            .bind("cmd", cmd.to_string())
    }

    fn test_result(store: &NodeStore, code: NodeId, cmd: &str, exit_code: i64) -> Result<Arc<Node>, RunError> {
        Ok(store.create(
            TestResultNode {
                code,
                test_code: None,
                cmd: cmd.into(),
                exit_code,
            },
            format!("exit {exit_code}"),
        )?)
    }

    // -----------------------------------------------------------------------
    // Declaration
    // -----------------------------------------------------------------------

    #[test]
    fn declaration_checks() {
        assert!(matches!(
            Analysis::<TestResultNode>::new("a", "code", &["code", "stdout"]),
            Err(AnalysisError::Definition { .. })
        ));
        assert!(matches!(
            Analysis::<TestResultNode>::new("a", "code", &["cmd"]),
            Err(AnalysisError::Definition { .. })
        ));
        assert!(matches!(
            Analysis::<TestResultNode>::new("a", "cmd", &["code", "cmd"]),
            Err(AnalysisError::Definition { .. })
        ));
        // Optional references cannot be keys.
        assert!(matches!(
            Analysis::<TestResultNode>::new("a", "test_code", &["code", "test_code"]),
            Err(AnalysisError::Definition { .. })
        ));
        assert!(matches!(
            Analysis::<TestResultNode>::new("a", "code", &["code", "code"]),
            Err(AnalysisError::Definition { .. })
        ));
        assert!(Analysis::<FindUnsafeAnalysisNode>::new("find_unsafe", "code", &["code", "commit"]).is_ok());
    }

    // -----------------------------------------------------------------------
    // Hits and misses
    // -----------------------------------------------------------------------

    #[test]
    fn miss_then_hit() {
        let fx = fixture();
        let analysis = run_tests();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            test_result(&fx.store, fx.code, "cargo test", 0)
        };

        let first = analysis
            .run(&fx.index, &args(fx.code, "cargo test"), compute)
            .unwrap();
        let second = analysis
            .run::<RunError, _>(&fx.index, &args(fx.code, "cargo test"), || {
                panic!("should be cached")
            })
            .unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn different_arguments_miss() {
        let fx = fixture();
        let analysis = run_tests();
        analysis
            .run(&fx.index, &args(fx.code, "cargo test"), || {
                test_result(&fx.store, fx.code, "cargo test", 0)
            })
            .unwrap();

        let calls = Cell::new(0);
        let other = analysis
            .run(&fx.index, &args(fx.code, "cargo test --release"), || {
                calls.set(calls.get() + 1);
                test_result(&fx.store, fx.code, "cargo test --release", 1)
            })
            .unwrap();
        assert_eq!(calls.get(), 1);
        assert!(!other.expect_kind::<TestResultNode>().unwrap().passed());
    }

    #[test]
    fn results_of_other_kinds_are_ignored() {
        let fx = fixture();
        fx.store
            .create(
                FindUnsafeAnalysisNode {
                    code: fx.code,
                    commit: "abc".into(),
                    stderr: String::new(),
                },
                "{}",
            )
            .unwrap();
        let found = run_tests().lookup(&fx.index, &args(fx.code, "cargo test")).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn nodes_referring_through_other_fields_are_ignored() {
        let fx = fixture();
        // `code` appears as `test_code` here, not as `code`.
        let other_code = fx.store.create(FileNode {}, "other").unwrap().id();
        fx.store
            .create(
                TestResultNode {
                    code: other_code,
                    test_code: Some(fx.code),
                    cmd: "cargo test".into(),
                    exit_code: 0,
                },
                "",
            )
            .unwrap();
        let found = run_tests().lookup(&fx.index, &args(fx.code, "cargo test")).unwrap();
        assert!(found.is_empty());
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[test]
    fn ambiguity_is_an_error() {
        let fx = fixture();
        // A non-deterministic tool produced two different results.
        test_result(&fx.store, fx.code, "cargo test", 0).unwrap();
        test_result(&fx.store, fx.code, "cargo test", 101).unwrap();

        let err = run_tests()
            .run::<RunError, _>(&fx.index, &args(fx.code, "cargo test"), || {
                panic!("must not run")
            })
            .unwrap_err();
        match err {
            RunError::Analysis(AnalysisError::Ambiguous { candidates, .. }) => {
                assert_eq!(candidates.len(), 2)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn inconsistent_result_is_an_error() {
        let fx = fixture();
        let err = run_tests()
            .run(&fx.index, &args(fx.code, "cargo test"), || {
                test_result(&fx.store, fx.code, "make test", 0)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::Analysis(AnalysisError::Inconsistent { field: "cmd", .. })
        ));
    }

    #[test]
    fn result_of_wrong_kind_is_an_error() {
        let fx = fixture();
        let err = run_tests()
            .run(&fx.index, &args(fx.code, "cargo test"), || {
                Ok::<_, RunError>(fx.store.create(FileNode {}, "not a result")?)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::Analysis(AnalysisError::Store(StoreError::WrongKind { .. }))
        ));
    }

    #[test]
    fn compute_errors_propagate() {
        let fx = fixture();
        let err = run_tests()
            .run(&fx.index, &args(fx.code, "cargo test"), || {
                Err(RunError::Tool("sandbox unavailable".into()))
            })
            .unwrap_err();
        assert!(matches!(err, RunError::Tool(_)));
    }

    #[test]
    fn bindings_must_match_parameters() {
        let fx = fixture();
        let analysis = run_tests();
        let missing = Bindings::new().bind("code", fx.code);
        assert!(matches!(
            analysis.lookup(&fx.index, &missing),
            Err(AnalysisError::Unbound { param: "test_code", .. })
        ));

        let extra = args(fx.code, "x").bind("exit_code", 0i64);
        assert!(matches!(
            analysis.lookup(&fx.index, &extra),
            Err(AnalysisError::UnexpectedBinding { .. })
        ));

        let bad_key = args(fx.code, "x").bind("code", "not an id".to_string());
        assert!(matches!(
            analysis.lookup(&fx.index, &bad_key),
            Err(AnalysisError::Binding { param: "code", .. })
        ));
    }
}
