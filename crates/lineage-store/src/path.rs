use std::borrow::Borrow;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use lineage_codec::{describe, Canonical, CodecError, CodecResult, CollectRefs, Value};
use lineage_types::NodeId;

use crate::error::{StoreError, StoreResult};

/// A normalized, `/`-separated relative path used as a tree entry name.
///
/// Valid paths are non-empty, not absolute, contain no empty, `.` or `..`
/// components, no trailing `/`, no `\` and no NUL bytes. Because every
/// path has exactly one spelling, map-key uniqueness is path uniqueness.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelPath(String);

impl RelPath {
    /// Validate and wrap a path.
    pub fn new(path: impl Into<String>) -> StoreResult<Self> {
        let path = path.into();
        match check(&path) {
            Ok(()) => Ok(Self(path)),
            Err(reason) => Err(StoreError::InvalidPath { path, reason }),
        }
    }

    /// Convert a relative filesystem path into a `RelPath`.
    pub fn from_path(path: &Path) -> StoreResult<Self> {
        let display = path.display().to_string();
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => match part.to_str() {
                    Some(part) => parts.push(part),
                    None => {
                        return Err(StoreError::InvalidPath {
                            path: display,
                            reason: "not valid UTF-8",
                        })
                    }
                },
                _ => {
                    return Err(StoreError::InvalidPath {
                        path: display,
                        reason: "not a normalized relative path",
                    })
                }
            }
        }
        Self::new(parts.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// The path as a platform path, relative to some base directory.
    pub fn to_path_buf(&self) -> PathBuf {
        self.components().collect()
    }
}

fn check(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("empty path");
    }
    if path.starts_with('/') {
        return Err("absolute path");
    }
    if path.contains('\\') {
        return Err("contains a backslash");
    }
    if path.contains('\0') {
        return Err("contains a NUL byte");
    }
    for component in path.split('/') {
        match component {
            "" => return Err("empty component"),
            "." | ".." => return Err("contains a `.` or `..` component"),
            _ => {}
        }
    }
    Ok(())
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RelPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RelPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Canonical for RelPath {
    fn to_value(&self) -> Value {
        Value::Text(self.0.clone())
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Text(path) => match check(&path) {
                Ok(()) => Ok(Self(path)),
                Err(reason) => Err(CodecError::Invalid {
                    what: "relative path",
                    reason: format!("{path:?}: {reason}"),
                }),
            },
            other => Err(CodecError::UnexpectedType {
                expected: "text",
                found: describe(&other),
            }),
        }
    }
}

impl CollectRefs for RelPath {
    fn collect_refs(&self, _out: &mut Vec<NodeId>) {}
}
