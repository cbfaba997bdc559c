//! Schema migrations for retired node kinds.
//!
//! Stored nodes are never rewritten. When a node of a retired kind is
//! loaded, its raw metadata is passed through a chain of migrations until
//! it reaches a current kind. Each migration is a typed function from one
//! schema struct to another; the registry wraps it to operate on
//! [`RawMetadata`].

use std::collections::HashMap;
use std::fmt;

use lineage_types::NodeId;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::raw::RawMetadata;
use crate::schema::{define_schema, is_current_kind, LlmOpNode, Schema, TestResultNode};

type RawFn = Box<dyn Fn(RawMetadata) -> StoreResult<RawMetadata> + Send + Sync>;

/// What the registry knows about one retired kind.
struct Step {
    /// Rebuilds a record through the retired schema itself.
    canonicalize: RawFn,
    /// Converts a record to the next schema in the chain.
    migrate: RawFn,
}

/// Registry of migrations keyed by retired kind.
pub struct Migrations {
    steps: HashMap<&'static str, Step>,
}

impl Migrations {
    /// A registry with no migrations.
    pub fn empty() -> Self {
        Self {
            steps: HashMap::new(),
        }
    }

    /// A registry with every built-in migration.
    pub fn builtin() -> Self {
        let mut migrations = Self::empty();
        migrations
            .register(test_result_to_v2)
            .register(test_result_v2_to_node)
            .register(llm_op_v1_to_llm_op);
        migrations
    }

    /// Register a migration out of `Old::KIND`, replacing any previous one.
    pub fn register<Old, New, F>(&mut self, migrate: F) -> &mut Self
    where
        Old: Schema,
        New: Schema,
        F: Fn(Old) -> New + Send + Sync + 'static,
    {
        self.steps.insert(
            Old::KIND,
            Step {
                canonicalize: Box::new(|raw| Ok(Old::from_raw(raw)?.to_raw())),
                migrate: Box::new(move |raw| Ok(migrate(Old::from_raw(raw)?).to_raw())),
            },
        );
        self
    }

    /// Returns `true` if a migration out of `kind` is registered.
    pub fn is_retired(&self, kind: &str) -> bool {
        self.steps.contains_key(kind)
    }

    /// Rebuild a record of a retired kind through that kind's schema.
    ///
    /// Records that decode to the same schema value come out identical, so
    /// they encode to the same bytes whatever order their writer used.
    pub fn canonicalize(&self, raw: RawMetadata) -> StoreResult<RawMetadata> {
        match self.steps.get(raw.kind()) {
            Some(step) => (step.canonicalize)(raw),
            None => Err(StoreError::UnknownKind {
                kind: raw.kind().to_string(),
                migrated_from: None,
                chain: vec![raw.kind().to_string()],
            }),
        }
    }

    /// Migrate raw metadata until its kind is current.
    pub fn migrate(&self, raw: RawMetadata) -> StoreResult<RawMetadata> {
        let mut raw = raw;
        let mut chain = vec![raw.kind().to_string()];
        while !is_current_kind(raw.kind()) {
            let Some(step) = self.steps.get(raw.kind()) else {
                let migrated_from = chain.len().checked_sub(2).map(|i| chain[i].clone());
                return Err(StoreError::UnknownKind {
                    kind: raw.kind().to_string(),
                    migrated_from,
                    chain,
                });
            };
            raw = (step.migrate)(raw)?;
            let kind = raw.kind().to_string();
            let revisited = chain.contains(&kind);
            chain.push(kind);
            if revisited {
                return Err(StoreError::MigrationCycle { chain });
            }
        }
        if chain.len() > 1 {
            debug!(chain = %chain.join(" -> "), "migrated metadata");
        }
        Ok(raw)
    }

    /// Migrate the metadata of a stored node, reporting decode failures
    /// against `id`.
    pub(crate) fn migrate_node(&self, id: NodeId, raw: RawMetadata) -> StoreResult<RawMetadata> {
        self.migrate(raw).map_err(|e| e.malformed(id))
    }
}

impl Default for Migrations {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for Migrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.steps.keys().copied().collect();
        kinds.sort_unstable();
        f.debug_struct("Migrations").field("retired", &kinds).finish()
    }
}

// ---------------------------------------------------------------------------
// Retired kinds
// ---------------------------------------------------------------------------

define_schema! {
    /// First test result format: the command as an argument vector.
    pub struct TestResultV1 = "test_result" {
        code: NodeId,
        cmd: Vec<String>,
        exit_code: i64,
    }

    /// Test results with a shell command line but no separate test code.
    pub struct TestResultV2 = "test_result_v2" {
        code: NodeId,
        cmd: String,
        exit_code: i64,
    }

    /// LLM step before the prompt field was renamed.
    pub struct LlmOpV1 = "llm_op_v1" {
        old_code: NodeId,
        new_code: NodeId,
        prompt: NodeId,
        request: NodeId,
        response: NodeId,
    }
}

fn test_result_to_v2(old: TestResultV1) -> TestResultV2 {
    TestResultV2 {
        code: old.code,
        cmd: old.cmd.join(" "),
        exit_code: old.exit_code,
    }
}

fn test_result_v2_to_node(old: TestResultV2) -> TestResultNode {
    TestResultNode {
        code: old.code,
        test_code: None,
        cmd: old.cmd,
        exit_code: old.exit_code,
    }
}

fn llm_op_v1_to_llm_op(old: LlmOpV1) -> LlmOpNode {
    LlmOpNode {
        old_code: old.old_code,
        new_code: old.new_code,
        raw_prompt: old.prompt,
        request: old.request,
        response: old.response,
    }
}
