use std::sync::Arc;

use lineage_analysis::{Analysis, Bindings};
use lineage_index::{IndexEntry, ReverseIndex, UpdateStats};
use lineage_refs::{validate_tag_name, FsTagStore, ReflogEntry, TagStore};
use lineage_store::{Metadata, Node, NodeKind, NodeStore, StoreError};
use lineage_types::NodeId;
use tracing::info;

use crate::config::RepoConfig;
use crate::error::{SdkError, SdkResult};
use crate::workarea::WorkArea;

/// A Lineage repository: node store, tags and reverse index under one root.
pub struct Repository {
    config: RepoConfig,
    store: Arc<NodeStore>,
    tags: FsTagStore,
    index: ReverseIndex,
}

impl Repository {
    /// Open (creating if needed) the repository at `root` with default
    /// settings.
    pub fn open(root: impl Into<std::path::PathBuf>) -> SdkResult<Self> {
        Self::from_config(RepoConfig::at(root))
    }

    pub fn from_config(config: RepoConfig) -> SdkResult<Self> {
        let store = Arc::new(
            NodeStore::with_capacity(&config.root, config.cache_capacity)?
                .with_locking(config.lock_index),
        );
        let tags = FsTagStore::new(&config.root);
        let index = ReverseIndex::new(Arc::clone(&store)).with_locking(config.lock_index);
        info!(root = %config.root.display(), "opened repository");
        Ok(Self {
            config,
            store,
            tags,
            index,
        })
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    pub fn tags(&self) -> &FsTagStore {
        &self.tags
    }

    pub fn index(&self) -> &ReverseIndex {
        &self.index
    }

    // ---- Nodes ----

    pub fn create(
        &self,
        metadata: impl Into<Metadata>,
        body: impl Into<Vec<u8>>,
    ) -> SdkResult<Arc<Node>> {
        Ok(self.store.create(metadata, body)?)
    }

    pub fn get(&self, id: &NodeId) -> SdkResult<Arc<Node>> {
        Ok(self.store.get(id)?)
    }

    /// Load a node and return its metadata as kind `N`.
    pub fn get_as<N: NodeKind>(&self, id: &NodeId) -> SdkResult<N> {
        let node = self.store.get(id)?;
        Ok(node.expect_kind::<N>()?.clone())
    }

    pub fn ids_with_prefix(&self, prefix: &str) -> SdkResult<Vec<NodeId>> {
        Ok(self.store.ids_with_prefix(prefix)?)
    }

    /// Resolve a full id, a tag name, or a unique id prefix, in that order.
    pub fn resolve(&self, spec: &str) -> SdkResult<NodeId> {
        if let Ok(id) = spec.parse::<NodeId>() {
            if self.store.contains(&id)? {
                return Ok(id);
            }
        }
        if validate_tag_name(spec).is_ok() {
            if let Some(id) = self.tags.try_resolve_tag(spec)? {
                return Ok(id);
            }
        }
        match self.store.resolve_prefix(spec) {
            Ok(id) => Ok(id),
            Err(StoreError::PrefixNotFound(_) | StoreError::InvalidPrefix(_)) => {
                Err(SdkError::Unresolved(spec.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // ---- Tags ----

    pub fn set_tag(&self, name: &str, id: NodeId, reason: Option<&str>) -> SdkResult<()> {
        Ok(self.tags.set_tag(name, id, reason)?)
    }

    pub fn resolve_tag(&self, name: &str) -> SdkResult<NodeId> {
        Ok(self.tags.resolve_tag(name)?)
    }

    pub fn has_tag(&self, name: &str) -> SdkResult<bool> {
        Ok(self.tags.has_tag(name)?)
    }

    pub fn reflog(&self, name: &str) -> SdkResult<Vec<ReflogEntry>> {
        Ok(self.tags.reflog(name)?)
    }

    pub fn list_tags(&self) -> SdkResult<Vec<String>> {
        Ok(self.tags.list_tags()?)
    }

    // ---- Index and analyses ----

    /// Nodes that refer to `target`.
    pub fn query(&self, target: &NodeId) -> SdkResult<Vec<IndexEntry>> {
        Ok(self.index.query(target)?)
    }

    pub fn rebuild_index(&self) -> SdkResult<UpdateStats> {
        Ok(self.index.rebuild()?)
    }

    /// Run a memoized analysis against this repository's index.
    pub fn run_analysis<N, F>(
        &self,
        analysis: &Analysis<N>,
        args: &Bindings,
        compute: F,
    ) -> SdkResult<Arc<Node>>
    where
        N: NodeKind,
        F: FnOnce() -> SdkResult<Arc<Node>>,
    {
        analysis.run(&self.index, args, compute)
    }

    // ---- Work area ----

    /// Acquire the repository's work area.
    pub fn work_area(&self) -> SdkResult<WorkArea<'_>> {
        WorkArea::acquire(&self.store, self.config.keep_work_dir)
    }
}
