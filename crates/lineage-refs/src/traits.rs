//! The [`TagStore`] trait defining the tag storage interface.

use lineage_types::NodeId;

use crate::error::{RefError, Result};
use crate::types::ReflogEntry;

/// Storage backend for tags.
///
/// A tag is a name with an append-only history of targets. Setting a tag
/// never rewrites earlier entries; resolving it returns the newest target.
pub trait TagStore: Send + Sync {
    /// Point `name` at `node_id`, appending to its history.
    fn set_tag(&self, name: &str, node_id: NodeId, reason: Option<&str>) -> Result<()>;

    /// The current target of a tag.
    ///
    /// Returns [`RefError::NotFound`] if the tag has never been set.
    fn resolve_tag(&self, name: &str) -> Result<NodeId>;

    /// Every update of a tag, oldest first.
    fn reflog(&self, name: &str) -> Result<Vec<ReflogEntry>>;

    /// Returns `true` if the tag has been set at least once.
    fn has_tag(&self, name: &str) -> Result<bool>;

    /// Names of all tags, sorted.
    fn list_tags(&self) -> Result<Vec<String>>;

    /// Like [`TagStore::resolve_tag`], but `Ok(None)` for unknown tags.
    fn try_resolve_tag(&self, name: &str) -> Result<Option<NodeId>> {
        match self.resolve_tag(name) {
            Ok(id) => Ok(Some(id)),
            Err(RefError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
