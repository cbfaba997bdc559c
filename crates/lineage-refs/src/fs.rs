//! Filesystem tag store: one append-only file per tag under `tags/`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use lineage_types::NodeId;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RefError, Result};
use crate::names::validate_tag_name;
use crate::traits::TagStore;
use crate::types::ReflogEntry;

/// Tags stored as files under `<root>/tags/<name>`.
///
/// Each update appends one record in a single write. The newest target is
/// read back by seeking to 32 bytes before the end of the file, so resolving
/// a tag costs the same regardless of its history length.
#[derive(Clone, Debug)]
pub struct FsTagStore {
    dir: PathBuf,
}

impl FsTagStore {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join("tags"),
        }
    }

    fn tag_path(&self, name: &str) -> Result<PathBuf> {
        validate_tag_name(name)?;
        Ok(self.dir.join(name))
    }

    fn open(&self, name: &str) -> Result<File> {
        match File::open(self.tag_path(name)?) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RefError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl TagStore for FsTagStore {
    fn set_tag(&self, name: &str, node_id: NodeId, reason: Option<&str>) -> Result<()> {
        let path = self.tag_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let record = ReflogEntry::now(node_id, reason).encode()?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&record)?;
        debug!(tag = name, %node_id, "set tag");
        Ok(())
    }

    fn resolve_tag(&self, name: &str) -> Result<NodeId> {
        let mut file = self.open(name)?;
        let len = file.metadata()?.len();
        if len < NodeId::LENGTH as u64 {
            return Err(RefError::Corrupt {
                name: name.to_string(),
                reason: format!("file is only {len} bytes"),
            });
        }
        file.seek(SeekFrom::End(-(NodeId::LENGTH as i64)))?;
        let mut raw = [0u8; NodeId::LENGTH];
        file.read_exact(&mut raw)?;
        Ok(NodeId::from_raw(raw))
    }

    fn reflog(&self, name: &str) -> Result<Vec<ReflogEntry>> {
        let mut bytes = Vec::new();
        self.open(name)?.read_to_end(&mut bytes)?;
        let mut input = bytes.as_slice();
        let mut entries = Vec::new();
        while !input.is_empty() {
            let entry = ReflogEntry::decode(&mut input).map_err(|e| RefError::Corrupt {
                name: name.to_string(),
                reason: format!("record {}: {e}", entries.len()),
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn has_tag(&self, name: &str) -> Result<bool> {
        Ok(self.tag_path(name)?.is_file())
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1) {
            let entry = entry.map_err(|e| RefError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.dir) else {
                continue;
            };
            let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
            let Some(parts) = parts else {
                continue;
            };
            let name = parts.join("/");
            if validate_tag_name(&name).is_ok() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
