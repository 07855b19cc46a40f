//! Child listing port (interface).

use crate::domain::{NodeKind, Resource, ResourcePath};
use crate::error::Result;

/// Port for listing the children of a node from the backend.
///
/// The resource tree uses this to re-derive a node's children. The odo
/// client implements it by issuing the listing command for the parent's kind.
pub trait ChildSource: Send + Sync {
    /// List the current children of a node of `kind` located at `path`.
    ///
    /// Leaf kinds return an empty list without touching the backend.
    fn list_children(
        &self,
        kind: NodeKind,
        path: &ResourcePath,
    ) -> impl std::future::Future<Output = Result<Vec<Resource>>> + Send;
}
