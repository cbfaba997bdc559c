//! Scratch directories for materializing trees and capturing results.
//!
//! A repository has at most one work area at a time, at `<root>/work`.
//! Acquiring it creates the directory, which fails if it already exists, so
//! two processes sharing a repository cannot use it at once.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSetBuilder};
use lineage_store::{FileNode, NodeStore, RelPath, TreeNode};
use lineage_types::NodeId;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{SdkError, SdkResult};

/// Directory name of the work area under the repository root.
pub const WORK_DIR: &str = "work";

/// An exclusively held scratch directory, removed on drop unless kept.
#[derive(Debug)]
pub struct WorkArea<'a> {
    store: &'a NodeStore,
    dir: PathBuf,
    keep: bool,
}

impl<'a> WorkArea<'a> {
    /// Create the work directory for `store`.
    ///
    /// Returns [`SdkError::WorkAreaBusy`] if it already exists.
    pub fn acquire(store: &'a NodeStore, keep: bool) -> SdkResult<Self> {
        let dir = store.root().join(WORK_DIR);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SdkError::WorkAreaBusy(dir));
            }
            Err(e) => return Err(e.into()),
        }
        debug!(dir = %dir.display(), "acquired work area");
        Ok(Self { store, dir, keep })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Keep (or stop keeping) the directory after release.
    pub fn set_keep(&mut self, keep: bool) {
        self.keep = keep;
    }

    /// Write every file of a tree into the work area.
    pub fn checkout(&self, tree: &NodeId) -> SdkResult<()> {
        let node = self.store.get(tree)?;
        let tree = node.expect_kind::<TreeNode>()?;
        for (path, file) in &tree.files {
            self.checkout_file(path, file)?;
        }
        Ok(())
    }

    /// Write one file node at `path`.
    ///
    /// Returns [`SdkError::PathExists`] if `path` is already taken, e.g. by
    /// an earlier checkout of an overlapping tree.
    pub fn checkout_file(&self, path: &RelPath, file: &NodeId) -> SdkResult<()> {
        let node = self.store.get(file)?;
        node.expect_kind::<FileNode>()?;
        let dest = self.dir.join(path.to_path_buf());
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = match OpenOptions::new().write(true).create_new(true).open(&dest) {
            Ok(out) => out,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SdkError::PathExists(dest));
            }
            Err(e) => return Err(e.into()),
        };
        out.write_all(node.body())?;
        Ok(())
    }

    /// Store the file at `path` as a file node.
    pub fn commit_file(&self, path: &RelPath) -> SdkResult<NodeId> {
        let contents = fs::read(self.dir.join(path.to_path_buf()))?;
        Ok(self.store.create(FileNode {}, contents)?.id())
    }

    /// Store the given files and a tree node listing them.
    pub fn commit<I>(&self, paths: I) -> SdkResult<NodeId>
    where
        I: IntoIterator<Item = RelPath>,
    {
        let mut files = BTreeMap::new();
        for path in paths {
            let id = self.commit_file(&path)?;
            files.insert(path, id);
        }
        let count = files.len();
        let tree = self.store.create(TreeNode { files }, Vec::new())?;
        debug!(files = count, id = %tree.id(), "committed work area");
        Ok(tree.id())
    }

    /// Store every regular file under the work area as one tree.
    pub fn commit_all(&self) -> SdkResult<NodeId> {
        self.commit(self.files()?)
    }

    /// Store the files matching any of `patterns` as one tree.
    ///
    /// Patterns are relative to the work area. `*` matches within a single
    /// path component and `**` spans directories, so `**/*.rs` picks up
    /// Rust sources at any depth.
    pub fn commit_glob<I, S>(&self, patterns: I) -> SdkResult<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(
                GlobBuilder::new(pattern.as_ref())
                    .literal_separator(true)
                    .build()?,
            );
        }
        let globs = builder.build()?;
        let paths: Vec<RelPath> = self
            .files()?
            .into_iter()
            .filter(|path| globs.is_match(path.as_str()))
            .collect();
        debug!(matched = paths.len(), "collected files by pattern");
        self.commit(paths)
    }

    /// Relative paths of every regular file under the work area.
    fn files(&self) -> SdkResult<Vec<RelPath>> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| SdkError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.dir)
                .map_err(|_| SdkError::OutsideWorkArea {
                    path: entry.path().to_path_buf(),
                })?;
            paths.push(RelPath::from_path(rel)?);
        }
        Ok(paths)
    }
}

impl Drop for WorkArea<'_> {
    fn drop(&mut self) {
        if self.keep {
            debug!(dir = %self.dir.display(), "keeping work area");
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "failed to remove work area");
        }
    }
}
