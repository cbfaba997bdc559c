//! In-memory tag store for testing and embedding.

use std::collections::BTreeMap;
use std::sync::RwLock;

use lineage_types::NodeId;

use crate::error::{RefError, Result};
use crate::names::validate_tag_name;
use crate::traits::TagStore;
use crate::types::ReflogEntry;

/// An in-memory implementation of [`TagStore`].
///
/// Histories live in a `BTreeMap` behind a `RwLock`. Data is lost when the
/// store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryTagStore {
    tags: RwLock<BTreeMap<String, Vec<ReflogEntry>>>,
}

impl InMemoryTagStore {
    /// Create a new empty tag store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TagStore for InMemoryTagStore {
    fn set_tag(&self, name: &str, node_id: NodeId, reason: Option<&str>) -> Result<()> {
        validate_tag_name(name)?;
        let mut tags = self.tags.write().map_err(|_| RefError::LockPoisoned)?;
        tags.entry(name.to_string())
            .or_default()
            .push(ReflogEntry::now(node_id, reason));
        Ok(())
    }

    fn resolve_tag(&self, name: &str) -> Result<NodeId> {
        let tags = self.tags.read().map_err(|_| RefError::LockPoisoned)?;
        tags.get(name)
            .and_then(|log| log.last())
            .map(|entry| entry.node_id)
            .ok_or_else(|| RefError::NotFound {
                name: name.to_string(),
            })
    }

    fn reflog(&self, name: &str) -> Result<Vec<ReflogEntry>> {
        let tags = self.tags.read().map_err(|_| RefError::LockPoisoned)?;
        tags.get(name).cloned().ok_or_else(|| RefError::NotFound {
            name: name.to_string(),
        })
    }

    fn has_tag(&self, name: &str) -> Result<bool> {
        let tags = self.tags.read().map_err(|_| RefError::LockPoisoned)?;
        Ok(tags.contains_key(name))
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        let tags = self.tags.read().map_err(|_| RefError::LockPoisoned)?;
        Ok(tags.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> NodeId {
        NodeId::from_raw([byte; 32])
    }

    #[test]
    fn set_and_resolve() {
        let store = InMemoryTagStore::new();
        store.set_tag("latest", id(1), None).unwrap();
        store.set_tag("latest", id(2), Some("newer")).unwrap();
        assert_eq!(store.resolve_tag("latest").unwrap(), id(2));

        let log = store.reflog("latest").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].node_id, id(1));
        assert_eq!(log[1].reason.as_deref(), Some("newer"));
    }

    #[test]
    fn unknown_tag() {
        let store = InMemoryTagStore::new();
        assert!(matches!(
            store.resolve_tag("nope"),
            Err(RefError::NotFound { .. })
        ));
        assert_eq!(store.try_resolve_tag("nope").unwrap(), None);
        assert!(!store.has_tag("nope").unwrap());
    }

    #[test]
    fn invalid_name_is_rejected() {
        let store = InMemoryTagStore::new();
        assert!(store.set_tag("../x", id(1), None).is_err());
        assert!(store.list_tags().unwrap().is_empty());
    }
}
