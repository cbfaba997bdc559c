//! The incremental reverse index.
//!
//! For every node `T`, the file `index/<b0>/<rest>` of `T` lists the nodes
//! whose metadata refers to `T`. Entries are only ever appended.
//!
//! # Keeping up with the store
//!
//! There is no transaction log. Instead two stamp files are compared:
//! the store touches `nodes` before writing any node file, and the index
//! touches `index` after each update. The index is stale if `index` is
//! missing, or if `nodes` is at least as new as `index`.
//!
//! An update scans node files whose mtime is at or after the previous
//! `index` mtime. Equal timestamps count as "possibly newer", so some files
//! are seen twice; the `index` stamp's content (the ids processed by the
//! previous update) lets those be skipped.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use lineage_codec::{decode_value, encode_value, Canonical};
use lineage_store::{NodeStore, UPDATE_LOCK};
use lineage_types::NodeId;
use tracing::{debug, info};

use crate::entry::IndexEntry;
use crate::error::{IndexError, IndexResult};

/// Stamp touched after each index update; holds the processed ids.
pub const INDEX_STAMP: &str = "index";

/// Counters from one index update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Nodes whose references were recorded.
    pub indexed: usize,
    /// Nodes seen again after an update with an equal timestamp.
    pub skipped: usize,
    /// Entries appended.
    pub entries: usize,
}

/// Reverse-reference index over a [`NodeStore`].
pub struct ReverseIndex {
    store: Arc<NodeStore>,
    dir: PathBuf,
    locking: bool,
}

impl ReverseIndex {
    /// An index stored alongside `store`, under `<root>/index`.
    pub fn new(store: Arc<NodeStore>) -> Self {
        let dir = store.root().join("index");
        Self {
            store,
            dir,
            locking: true,
        }
    }

    /// Enable or disable the update lock. Without it, a node written while
    /// an update is scanning may be missed until the next [`rebuild`].
    ///
    /// [`rebuild`]: ReverseIndex::rebuild
    pub fn with_locking(mut self, locking: bool) -> Self {
        self.locking = locking;
        self
    }

    pub fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    fn entry_path(&self, target: &NodeId) -> PathBuf {
        let (dir, file) = target.shard();
        self.dir.join(dir).join(file)
    }

    /// All recorded references to `target`, after catching up with the
    /// store. Empty if nothing refers to it.
    pub fn query(&self, target: &NodeId) -> IndexResult<Vec<IndexEntry>> {
        self.ensure_current()?;
        self.read_entries(target)
    }

    /// Whether the store may hold nodes the index has not seen.
    pub fn is_stale(&self) -> IndexResult<bool> {
        let stamps = self.store.stamps();
        let index = stamps.mtime(INDEX_STAMP)?;
        let nodes = stamps.mtime(lineage_store::NODES_STAMP)?;
        Ok(match (index, nodes) {
            (None, _) => true,
            (Some(index), Some(nodes)) => nodes >= index,
            (Some(_), None) => false,
        })
    }

    /// Bring the index up to date if it is stale.
    ///
    /// Returns `None` if no update was needed.
    pub fn ensure_current(&self) -> IndexResult<Option<UpdateStats>> {
        if !self.is_stale()? {
            return Ok(None);
        }
        let _lock = self.lock()?;
        // Another process may have finished an update while we waited.
        if !self.is_stale()? {
            return Ok(None);
        }
        let watermark = self.store.stamps().mtime(INDEX_STAMP)?;
        self.update(watermark).map(Some)
    }

    /// Discard the index and rebuild it from every stored node.
    pub fn rebuild(&self) -> IndexResult<UpdateStats> {
        let _lock = self.lock()?;
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.store.stamps().remove(INDEX_STAMP)?;
        info!(root = %self.store.root().display(), "rebuilding reverse index");
        self.update(None)
    }

    /// Exclude node writers and other index updates until dropped.
    fn lock(&self) -> IndexResult<Option<File>> {
        if !self.locking {
            return Ok(None);
        }
        Ok(Some(self.store.stamps().lock(UPDATE_LOCK, true)?))
    }

    fn update(&self, watermark: Option<SystemTime>) -> IndexResult<UpdateStats> {
        let stamps = self.store.stamps();
        let previous = processed_ids(&stamps.read(INDEX_STAMP)?)?;

        let mut stats = UpdateStats::default();
        let mut processed = Vec::new();
        for source in self.store.nodes_newer_than(watermark)? {
            // Every enumerated id is recorded, including skipped ones: if
            // the stamp mtime does not advance, the next update sees them
            // again.
            processed.extend_from_slice(source.as_bytes());
            if previous.contains(&source) {
                stats.skipped += 1;
                continue;
            }

            let node = self.store.get(&source)?;
            for (key, target) in node.metadata().field_refs() {
                self.append(&target, &IndexEntry::new(source, node.kind(), key))?;
                stats.entries += 1;
            }
            stats.indexed += 1;
        }

        stamps.touch(INDEX_STAMP, &processed)?;
        info!(
            indexed = stats.indexed,
            skipped = stats.skipped,
            entries = stats.entries,
            "updated reverse index"
        );
        Ok(stats)
    }

    fn append(&self, target: &NodeId, entry: &IndexEntry) -> IndexResult<()> {
        let path = self.entry_path(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = encode_value(&entry.to_value())?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&bytes)?;
        debug!(%target, source = %entry.source, key = %entry.key, "index entry");
        Ok(())
    }

    fn read_entries(&self, target: &NodeId) -> IndexResult<Vec<IndexEntry>> {
        let bytes = match fs::read(self.entry_path(target)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let corrupt = |reason: String| IndexError::Corrupt {
            target: *target,
            reason,
        };
        let mut input = bytes.as_slice();
        let mut entries = Vec::new();
        while !input.is_empty() {
            let value = decode_value(&mut input).map_err(|e| corrupt(e.to_string()))?;
            entries.push(IndexEntry::from_value(value).map_err(|e| corrupt(e.to_string()))?);
        }
        Ok(entries)
    }
}

fn processed_ids(stamp: &[u8]) -> IndexResult<HashSet<NodeId>> {
    if stamp.len() % NodeId::LENGTH != 0 {
        return Err(IndexError::CorruptStamp(stamp.len()));
    }
    stamp
        .chunks_exact(NodeId::LENGTH)
        .map(|raw| NodeId::from_slice(raw).map_err(|_| IndexError::CorruptStamp(stamp.len())))
        .collect()
}

impl std::fmt::Debug for ReverseIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverseIndex")
            .field("dir", &self.dir)
            .field("locking", &self.locking)
            .finish()
    }
}
