use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fs4::FileExt;

use crate::error::StoreResult;

/// Stamp touched before every node file is written.
pub const NODES_STAMP: &str = "nodes";

/// Lock file held shared while a node file is written and exclusively while
/// the reverse index scans for new nodes.
pub const UPDATE_LOCK: &str = "index.lock";

/// Stamp files under `<root>/stamps`.
///
/// A stamp's modification time is the signal. Stamps are only ever touched
/// by rewriting them, so their times come from the same filesystem clock as
/// the node files they are compared against.
#[derive(Clone, Debug)]
pub struct Stamps {
    dir: PathBuf,
}

impl Stamps {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join("stamps"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Modification time of a stamp, or `None` if it has never been touched.
    pub fn mtime(&self, name: &str) -> StoreResult<Option<SystemTime>> {
        match fs::metadata(self.path(name)) {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a stamp's content, updating its modification time.
    pub fn touch(&self, name: &str, content: &[u8]) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = File::create(self.path(name))?;
        file.write_all(content)?;
        Ok(())
    }

    /// Content of a stamp; empty if it does not exist.
    pub fn read(&self, name: &str) -> StoreResult<Vec<u8>> {
        match fs::read(self.path(name)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Open a lock file under the stamps directory and lock it, blocking
    /// until the lock is granted. The lock is released when the returned
    /// file is dropped.
    pub fn lock(&self, name: &str, exclusive: bool) -> StoreResult<File> {
        fs::create_dir_all(&self.dir)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.path(name))?;
        if exclusive {
            file.lock_exclusive()?;
        } else {
            file.lock_shared()?;
        }
        Ok(file)
    }

    /// Delete a stamp. Missing stamps are not an error.
    pub fn remove(&self, name: &str) -> StoreResult<()> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_stamp_has_no_mtime_and_no_content() {
        let dir = tempfile::tempdir().unwrap();
        let stamps = Stamps::new(dir.path());
        assert!(stamps.mtime("index").unwrap().is_none());
        assert!(stamps.read("index").unwrap().is_empty());
    }

    #[test]
    fn touch_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let stamps = Stamps::new(dir.path());
        stamps.touch("index", b"first").unwrap();
        stamps.touch("index", b"2nd").unwrap();
        assert_eq!(stamps.read("index").unwrap(), b"2nd");
        assert!(stamps.mtime("index").unwrap().is_some());
    }

    #[test]
    fn touch_never_moves_mtime_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let stamps = Stamps::new(dir.path());
        stamps.touch(NODES_STAMP, &[]).unwrap();
        let first = stamps.mtime(NODES_STAMP).unwrap().unwrap();
        stamps.touch(NODES_STAMP, &[]).unwrap();
        let second = stamps.mtime(NODES_STAMP).unwrap().unwrap();
        assert!(second >= first);
    }

    #[test]
    fn shared_locks_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let stamps = Stamps::new(dir.path());
        let _a = stamps.lock(UPDATE_LOCK, false).unwrap();
        let _b = stamps.lock(UPDATE_LOCK, false).unwrap();
        assert!(stamps.path(UPDATE_LOCK).exists());
    }

    #[test]
    fn exclusive_lock_waits_for_writers() {
        let dir = tempfile::tempdir().unwrap();
        let stamps = Stamps::new(dir.path());
        let shared = stamps.lock(UPDATE_LOCK, false).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::scope(|s| {
            s.spawn(|| {
                let _exclusive = stamps.lock(UPDATE_LOCK, true).unwrap();
                tx.send(()).unwrap();
            });
            std::thread::sleep(std::time::Duration::from_millis(50));
            assert!(rx.try_recv().is_err());
            drop(shared);
            rx.recv().unwrap();
        });
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let stamps = Stamps::new(dir.path());
        stamps.touch("index", b"x").unwrap();
        stamps.remove("index").unwrap();
        stamps.remove("index").unwrap();
        assert!(stamps.mtime("index").unwrap().is_none());
    }
}
