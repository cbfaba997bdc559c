use std::fs;
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use lineage_codec::{decode_value, NodeHasher, Value};
use lineage_types::{NodeId, NodeIdPrefix};
use lru::LruCache;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::migrate::Migrations;
use crate::node::Node;
use crate::raw::RawMetadata;
use crate::schema::{is_current_kind, Metadata};
use crate::stamp::{Stamps, NODES_STAMP, UPDATE_LOCK};

/// Default number of nodes kept in the in-process cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Filesystem-backed, content-addressed node store.
///
/// Node files live at `<root>/nodes/<b0>/<rest>` where `b0` is the first
/// byte of the id in hex. Each file holds the canonical metadata followed
/// by the body. Files are written once, through a temporary file that is
/// made read-only and renamed into place.
///
/// Recently used nodes are kept in an LRU cache; cached and on-disk nodes
/// are interchangeable since nodes never change.
pub struct NodeStore {
    root: PathBuf,
    nodes_dir: PathBuf,
    stamps: Stamps,
    cache: Mutex<LruCache<NodeId, Arc<Node>>>,
    migrations: Migrations,
    locking: bool,
}

impl NodeStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::with_capacity(root, DEFAULT_CACHE_CAPACITY)
    }

    /// Open a store with a specific cache capacity (at least one entry).
    pub fn with_capacity(root: impl Into<PathBuf>, capacity: usize) -> StoreResult<Self> {
        let root = root.into();
        let nodes_dir = root.join("nodes");
        fs::create_dir_all(&nodes_dir)?;
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            stamps: Stamps::new(&root),
            nodes_dir,
            root,
            cache: Mutex::new(LruCache::new(capacity)),
            migrations: Migrations::builtin(),
            locking: true,
        })
    }

    /// Enable or disable the shared [`UPDATE_LOCK`] taken while writing a
    /// node file. Disable it only together with the index's lock.
    pub fn with_locking(mut self, locking: bool) -> Self {
        self.locking = locking;
        self
    }

    /// Replace the migration registry.
    pub fn with_migrations(mut self, migrations: Migrations) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stamps(&self) -> &Stamps {
        &self.stamps
    }

    pub fn migrations(&self) -> &Migrations {
        &self.migrations
    }

    fn node_path(&self, id: &NodeId) -> PathBuf {
        let (dir, file) = id.shard();
        self.nodes_dir.join(dir).join(file)
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    /// Store a node, returning the existing one if identical content is
    /// already present.
    pub fn create(
        &self,
        metadata: impl Into<Metadata>,
        body: impl Into<Vec<u8>>,
    ) -> StoreResult<Arc<Node>> {
        let metadata = metadata.into();
        let body = body.into();
        let meta_bytes = metadata.to_raw().encode()?;
        let id = NodeHasher::node_id(&meta_bytes, &body);

        if let Some(node) = self.cached(&id)? {
            return Ok(node);
        }
        self.write_file(&id, &meta_bytes, &body)?;
        let node = Arc::new(Node::new(id, metadata, body));
        self.publish(Arc::clone(&node))?;
        Ok(node)
    }

    /// Store a node from untyped metadata of a current kind.
    pub fn create_dynamic(
        &self,
        raw: RawMetadata,
        body: impl Into<Vec<u8>>,
    ) -> StoreResult<Arc<Node>> {
        if !is_current_kind(raw.kind()) {
            return Err(StoreError::Validation {
                kind: raw.kind().to_string(),
                reason: "not a current node kind".into(),
            });
        }
        let metadata = Metadata::from_raw(raw)?;
        self.create(metadata, body)
    }

    /// Store a record written in a retired schema.
    ///
    /// The record is rebuilt through its own schema before hashing, so two
    /// writers that laid out the same record differently agree on its id. It
    /// keeps its retired kind on disk and is migrated whenever it is loaded.
    /// Current kinds are rejected; store those with
    /// [`create_dynamic`](Self::create_dynamic).
    pub fn import_raw(&self, raw: RawMetadata, body: impl Into<Vec<u8>>) -> StoreResult<Arc<Node>> {
        if is_current_kind(raw.kind()) {
            return Err(StoreError::Validation {
                kind: raw.kind().to_string(),
                reason: "current kind; store it with create_dynamic".into(),
            });
        }
        let raw = self.migrations.canonicalize(raw)?;
        let body = body.into();
        let meta_bytes = raw.encode()?;
        let id = NodeHasher::node_id(&meta_bytes, &body);
        if let Some(node) = self.cached(&id)? {
            return Ok(node);
        }

        let metadata = Metadata::from_raw(self.migrations.migrate(raw)?)?;
        self.write_file(&id, &meta_bytes, &body)?;
        let node = Arc::new(Node::new(id, metadata, body));
        self.publish(Arc::clone(&node))?;
        Ok(node)
    }

    fn write_file(&self, id: &NodeId, meta_bytes: &[u8], body: &[u8]) -> StoreResult<()> {
        let path = self.node_path(id);
        if path.try_exists()? {
            debug!(%id, "node already stored");
            return Ok(());
        }

        // Index updates hold this lock exclusively while scanning, so the
        // stamp and the file below land either wholly before a scan or
        // wholly after it.
        let _lock = if self.locking {
            Some(self.stamps.lock(UPDATE_LOCK, false)?)
        } else {
            None
        };
        // The stamp goes first so an index update can never miss this file.
        self.stamps.touch(NODES_STAMP, &[])?;

        let (shard, _) = id.shard();
        let dir = self.nodes_dir.join(shard);
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::Builder::new().prefix(".tmp").tempfile_in(&dir)?;
        tmp.write_all(meta_bytes)?;
        tmp.write_all(body)?;
        tmp.as_file().sync_all()?;
        set_read_only(tmp.path())?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!(%id, bytes = meta_bytes.len() + body.len(), "wrote node");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Load a node by id.
    pub fn get(&self, id: &NodeId) -> StoreResult<Arc<Node>> {
        if let Some(node) = self.cached(id)? {
            return Ok(node);
        }
        let bytes = self.read_file(id)?;
        let node = Arc::new(self.decode_node(*id, &bytes)?);
        self.publish(Arc::clone(&node))?;
        Ok(node)
    }

    /// Returns `true` if a node with this id is stored.
    pub fn contains(&self, id: &NodeId) -> StoreResult<bool> {
        if self.cached(id)?.is_some() {
            return Ok(true);
        }
        Ok(self.node_path(id).try_exists()?)
    }

    /// The undecoded metadata value of a stored node, before any migration.
    pub fn read_raw_metadata(&self, id: &NodeId) -> StoreResult<Value> {
        let bytes = self.read_file(id)?;
        decode_value(&mut bytes.as_slice()).map_err(|e| StoreError::Malformed {
            id: *id,
            reason: e.to_string(),
        })
    }

    fn read_file(&self, id: &NodeId) -> StoreResult<Vec<u8>> {
        match fs::read(self.node_path(id)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }

    fn decode_node(&self, id: NodeId, bytes: &[u8]) -> StoreResult<Node> {
        if !NodeHasher::verify(bytes, &id) {
            return Err(StoreError::Malformed {
                id,
                reason: "content hash mismatch".into(),
            });
        }
        let mut input = bytes;
        let raw = RawMetadata::decode(&mut input).map_err(|e| StoreError::Malformed {
            id,
            reason: e.to_string(),
        })?;
        let raw = self.migrations.migrate_node(id, raw)?;
        let metadata = Metadata::from_raw(raw).map_err(|e| e.malformed(id))?;
        Ok(Node::new(id, metadata, input.to_vec()))
    }

    fn cached(&self, id: &NodeId) -> StoreResult<Option<Arc<Node>>> {
        let mut cache = self.cache.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(cache.get(id).cloned())
    }

    fn publish(&self, node: Arc<Node>) -> StoreResult<()> {
        let mut cache = self.cache.lock().map_err(|_| StoreError::LockPoisoned)?;
        cache.put(node.id(), node);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    /// All stored ids starting with a hex prefix of at least two characters.
    pub fn ids_with_prefix(&self, prefix: &str) -> StoreResult<Vec<NodeId>> {
        let prefix = NodeIdPrefix::parse(prefix)?;
        let dir = self.nodes_dir.join(prefix.shard());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') || !name.starts_with(prefix.rest()) {
                continue;
            }
            match NodeId::from_shard(prefix.shard(), name) {
                Ok(id) => ids.push(id),
                Err(e) => warn!(path = %entry.path().display(), error = %e, "unexpected file in nodes directory"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// The single stored id matching a prefix.
    pub fn resolve_prefix(&self, prefix: &str) -> StoreResult<NodeId> {
        let mut ids = self.ids_with_prefix(prefix)?;
        match ids.len() {
            0 => Err(StoreError::PrefixNotFound(prefix.to_string())),
            1 => Ok(ids.remove(0)),
            _ => Err(StoreError::AmbiguousPrefix {
                prefix: prefix.to_string(),
                candidates: ids,
            }),
        }
    }

    /// Ids of node files modified at or after `watermark`; every stored id
    /// when `watermark` is `None`.
    ///
    /// Shard directories older than the watermark are skipped without
    /// listing: adding a file updates its directory's mtime, and node files
    /// are never modified after creation.
    pub fn nodes_newer_than(&self, watermark: Option<SystemTime>) -> StoreResult<Vec<NodeId>> {
        let mut ids = Vec::new();
        for shard in fs::read_dir(&self.nodes_dir)? {
            let shard = shard?;
            let shard_name = shard.file_name();
            let Some(shard_name) = shard_name.to_str() else {
                continue;
            };
            if shard_name.starts_with('.') || !shard.file_type()?.is_dir() {
                continue;
            }
            if let Some(mark) = watermark {
                if shard.metadata()?.modified()? < mark {
                    continue;
                }
            }

            for file in fs::read_dir(shard.path())? {
                let file = file?;
                let file_name = file.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };
                if file_name.starts_with('.') {
                    continue;
                }
                if let Some(mark) = watermark {
                    if file.metadata()?.modified()? < mark {
                        continue;
                    }
                }
                match NodeId::from_shard(shard_name, file_name) {
                    Ok(id) => ids.push(id),
                    Err(e) => warn!(path = %file.path().display(), error = %e, "unexpected file in nodes directory"),
                }
            }
        }
        Ok(ids)
    }
}

#[cfg(unix)]
fn set_read_only(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o444))
}

#[cfg(not(unix))]
fn set_read_only(path: &Path) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)
}

impl std::fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStore")
            .field("root", &self.root)
            .field("migrations", &self.migrations)
            .finish_non_exhaustive()
    }
}
