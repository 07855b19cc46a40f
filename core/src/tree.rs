//! In-memory resource tree.
//!
//! The tree is the client-side cache of the cluster. Nodes live in an arena
//! keyed by [`NodeId`]; every node owns an ordered list of child ids plus an
//! index by (kind, name). The only writer of a child collection is
//! [`ResourceTree::refresh_children`], which replaces it wholesale from a
//! fresh listing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{NodeKind, Resource, ResourceKey, ResourcePath};
use crate::error::{Error, Result};
use crate::ports::ChildSource;

/// Stable identity of a node for as long as it stays in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A copy of one node's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub resource: Resource,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.resource.kind()
    }

    pub fn name(&self) -> &str {
        self.resource.name()
    }
}

/// Recursive copy of a subtree, for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub id: NodeId,
    #[serde(flatten)]
    pub resource: Resource,
    /// Whether children have been listed at least once.
    pub loaded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

/// Children present on one side of a comparison but not the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub added: Vec<ResourceKey>,
    pub removed: Vec<ResourceKey>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compares two child listings by (kind, name).
///
/// `added` follows the order of `after`, `removed` the order of `before`.
pub fn diff(before: &[Resource], after: &[Resource]) -> Diff {
    let before_keys: HashSet<ResourceKey> = before.iter().map(Resource::key).collect();
    let after_keys: HashSet<ResourceKey> = after.iter().map(Resource::key).collect();

    let mut seen = HashSet::new();
    let added = after
        .iter()
        .map(Resource::key)
        .filter(|key| !before_keys.contains(key) && seen.insert(key.clone()))
        .collect();

    let mut seen = HashSet::new();
    let removed = before
        .iter()
        .map(Resource::key)
        .filter(|key| !after_keys.contains(key) && seen.insert(key.clone()))
        .collect();

    Diff { added, removed }
}

struct Slot {
    node: Node,
    children: Vec<NodeId>,
    index: HashMap<ResourceKey, NodeId>,
    loaded: bool,
}

impl Slot {
    fn new(node: Node) -> Self {
        Self {
            node,
            children: Vec::new(),
            index: HashMap::new(),
            loaded: false,
        }
    }
}

#[derive(Default)]
struct Arena {
    slots: HashMap<NodeId, Slot>,
    root: Option<NodeId>,
    next_id: u64,
}

impl Arena {
    fn insert(&mut self, parent: Option<NodeId>, resource: Resource) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.slots.insert(
            id,
            Slot::new(Node {
                id,
                parent,
                resource,
            }),
        );
        id
    }

    fn remove_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(slot) = self.slots.remove(&id) {
                stack.extend(slot.children);
            }
        }
    }

    fn slot(&self, id: NodeId) -> Result<&Slot> {
        self.slots.get(&id).ok_or(Error::NodeNotFound(id))
    }

    /// Replaces a node's children, keeping ids of children that persist.
    fn replace_children(&mut self, parent: NodeId, listed: Vec<Resource>) -> Result<Vec<Node>> {
        let previous = {
            let slot = self.slots.get_mut(&parent).ok_or(Error::NodeNotFound(parent))?;
            std::mem::take(&mut slot.index)
        };

        let mut children = Vec::with_capacity(listed.len());
        let mut index = HashMap::with_capacity(listed.len());
        for resource in listed {
            let key = resource.key();
            if index.contains_key(&key) {
                debug!(parent = %parent, key = %key, "Ignoring duplicate child in listing");
                continue;
            }
            let id = match previous.get(&key) {
                Some(&id) => {
                    if let Some(slot) = self.slots.get_mut(&id) {
                        slot.node.resource = resource;
                    }
                    id
                }
                None => self.insert(Some(parent), resource),
            };
            index.insert(key, id);
            children.push(id);
        }

        for (key, id) in previous {
            if !index.contains_key(&key) {
                self.remove_subtree(id);
            }
        }

        let slot = self.slots.get_mut(&parent).ok_or(Error::NodeNotFound(parent))?;
        slot.children = children;
        slot.index = index;
        slot.loaded = true;

        let slot = self.slot(parent)?;
        Ok(slot
            .children
            .iter()
            .filter_map(|id| self.slots.get(id))
            .map(|s| s.node.clone())
            .collect())
    }

    fn snapshot(&self, id: NodeId) -> Option<NodeSnapshot> {
        let slot = self.slots.get(&id)?;
        Some(NodeSnapshot {
            id,
            resource: slot.node.resource.clone(),
            loaded: slot.loaded,
            children: slot
                .children
                .iter()
                .filter_map(|child| self.snapshot(*child))
                .collect(),
        })
    }
}

/// The cluster hierarchy as last observed through `S`.
pub struct ResourceTree<S: ChildSource> {
    source: Arc<S>,
    arena: RwLock<Arena>,
}

impl<S: ChildSource> ResourceTree<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            arena: RwLock::new(Arena::default()),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Replaces the whole tree with a fresh cluster root.
    pub fn attach_root(&self, server_url: impl Into<String>) -> NodeId {
        let server_url = server_url.into();
        let mut arena = self.arena.write();
        let next_id = arena.next_id;
        *arena = Arena {
            next_id,
            ..Arena::default()
        };
        let id = arena.insert(None, Resource::Cluster { server_url: server_url.clone() });
        arena.root = Some(id);
        info!(server_url = %server_url, root = %id, "Cluster attached");
        id
    }

    /// Drops every node.
    pub fn detach_root(&self) {
        let mut arena = self.arena.write();
        let next_id = arena.next_id;
        *arena = Arena {
            next_id,
            ..Arena::default()
        };
        info!("Cluster detached");
    }

    pub fn root(&self) -> Option<NodeId> {
        self.arena.read().root
    }

    pub fn get(&self, id: NodeId) -> Option<Node> {
        self.arena.read().slots.get(&id).map(|s| s.node.clone())
    }

    /// Like [`get`](Self::get), but a missing node is an error.
    pub fn node(&self, id: NodeId) -> Result<Node> {
        self.get(id).ok_or(Error::NodeNotFound(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.read().slots.get(&id).and_then(|s| s.node.parent)
    }

    /// Whether the node's children have been listed at least once.
    pub fn is_loaded(&self, id: NodeId) -> bool {
        self.arena
            .read()
            .slots
            .get(&id)
            .map(|s| s.loaded)
            .unwrap_or(false)
    }

    /// Cached children in listing order.
    pub fn children(&self, id: NodeId) -> Result<Vec<Node>> {
        let arena = self.arena.read();
        let slot = arena.slot(id)?;
        Ok(slot
            .children
            .iter()
            .filter_map(|child| arena.slots.get(child))
            .map(|s| s.node.clone())
            .collect())
    }

    pub fn child_resources(&self, id: NodeId) -> Result<Vec<Resource>> {
        Ok(self
            .children(id)?
            .into_iter()
            .map(|node| node.resource)
            .collect())
    }

    /// First cached child named `name`, whatever its kind.
    pub fn find_child(&self, id: NodeId, name: &str) -> Option<Node> {
        let arena = self.arena.read();
        let slot = arena.slots.get(&id)?;
        slot.children
            .iter()
            .filter_map(|child| arena.slots.get(child))
            .find(|s| s.node.name() == name)
            .map(|s| s.node.clone())
    }

    pub fn find_child_of_kind(&self, id: NodeId, kind: NodeKind, name: &str) -> Option<Node> {
        let arena = self.arena.read();
        let child = arena
            .slots
            .get(&id)?
            .index
            .get(&ResourceKey::new(kind, name))?;
        arena.slots.get(child).map(|s| s.node.clone())
    }

    /// Names of the project, application and component enclosing `id`, itself included.
    pub fn path(&self, id: NodeId) -> Result<ResourcePath> {
        let arena = self.arena.read();
        let mut path = ResourcePath::default();
        let mut current = Some(id);
        while let Some(id) = current {
            let node = &arena.slot(id)?.node;
            match &node.resource {
                Resource::Project { name } => path.project = Some(name.clone()),
                Resource::Application { name } => path.application = Some(name.clone()),
                Resource::Component { name, .. } => path.component = Some(name.clone()),
                _ => {}
            }
            current = node.parent;
        }
        Ok(path)
    }

    pub fn snapshot(&self, id: NodeId) -> Option<NodeSnapshot> {
        self.arena.read().snapshot(id)
    }

    /// Re-lists a node's children from the source and replaces the cached set.
    ///
    /// Children that are listed again keep their id and cached subtree;
    /// children that are gone are dropped together with their subtree.
    pub async fn refresh_children(&self, id: NodeId) -> Result<Vec<Node>> {
        let kind = self.node(id)?.kind();
        let path = self.path(id)?;

        // No lock is held while the source runs.
        let listed = self.source.list_children(kind, &path).await?;
        debug!(node = %id, kind = %kind, count = listed.len(), "Refreshed children");

        self.arena.write().replace_children(id, listed)
    }
}
