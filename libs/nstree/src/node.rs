//! Tree nodes and the handles used to navigate them.
//!
//! Nodes live in the tree's arena and reference each other by id.
//! Public access goes through [`NodeRef`], a cheap cloneable handle pairing
//! the shared tree core with one node. Every node guards its own state with
//! its own mutex; public methods lock once and delegate to lock-free
//! helpers, and the only nested acquisition is parent-before-child during
//! resolution and subtree removal.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::arena::{Arena, NodeId};
use crate::component::{ComponentRef, ComponentState};
use crate::directory::{DirectoryRef, DirectoryState};
use crate::error::{Error, Result};
use crate::manager::{ManagerRef, ManagerState};
use crate::options::Options;
use crate::transport::ObjectRef;

/// Shared core of one tree: the node arena plus the injected options.
pub(crate) struct TreeCore {
    pub(crate) arena: Arena<Node>,
    pub(crate) options: Options,
}

impl TreeCore {
    pub(crate) fn new(options: Options) -> Self {
        Self {
            arena: Arena::new(),
            options,
        }
    }

    /// Free a node and all its descendants from the arena.
    ///
    /// Safe to call while holding an ancestor's lock: descendants are locked
    /// briefly and strictly top-down.
    pub(crate) fn free_subtree(&self, id: NodeId) {
        let mut stack = vec![id];
        let mut doomed = Vec::new();
        while let Some(next) = stack.pop() {
            doomed.push(next);
            if let Some(node) = self.arena.get(next) {
                let state = node.lock();
                stack.extend(state.children.values().copied());
            }
        }
        for id in doomed {
            self.arena.remove(id);
        }
    }
}

/// Kind of a node, dispatched by pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A naming context (the synthetic root included).
    Directory,
    /// A leaf wrapping a remote manager.
    Manager,
    /// A leaf wrapping a remote component.
    Component,
    /// A leaf whose binding kind was not recognized.
    UnknownLeaf,
}

/// One node of the mirror.
pub(crate) struct Node {
    id: NodeId,
    name: String,
    kind: NodeKind,
    state: Mutex<NodeState>,
}

/// Everything a node owns, guarded by its lock.
pub(crate) struct NodeState {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: BTreeMap<String, NodeId>,
    pub(crate) payload: Payload,
}

/// Kind-specific node state.
pub(crate) enum Payload {
    Directory(DirectoryState),
    Manager(ManagerState),
    Component(ComponentState),
    Unknown(UnknownState),
}

impl Payload {
    fn kind(&self) -> NodeKind {
        match self {
            Payload::Directory(_) => NodeKind::Directory,
            Payload::Manager(_) => NodeKind::Manager,
            Payload::Component(_) => NodeKind::Component,
            Payload::Unknown(_) => NodeKind::UnknownLeaf,
        }
    }
}

/// State of an unrecognized leaf: just the resolved reference.
pub(crate) struct UnknownState {
    pub(crate) handle: ObjectRef,
}

impl Node {
    pub(crate) fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().expect("node lock poisoned")
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn kind(&self) -> NodeKind {
        self.kind
    }
}

/// Create a node in the arena without linking it into any child map.
pub(crate) fn create_node(
    core: &Arc<TreeCore>,
    name: impl Into<String>,
    parent: Option<NodeId>,
    payload: Payload,
) -> NodeRef {
    let name = name.into();
    let kind = payload.kind();
    let id = core.arena.insert_with(|id| Node {
        id,
        name: name.clone(),
        kind,
        state: Mutex::new(NodeState {
            parent,
            children: BTreeMap::new(),
            payload,
        }),
    });
    let node = core.arena.get(id).expect("freshly inserted node");
    NodeRef {
        core: Arc::clone(core),
        node,
    }
}

/// Handle to one node of a tree.
///
/// Clones are cheap and refer to the same node. A handle stays usable after
/// its node has been unlinked by a reparse; the node is then simply no longer
/// reachable from the root, and its stale children resolve to nothing.
#[derive(Clone)]
pub struct NodeRef {
    core: Arc<TreeCore>,
    node: Arc<Node>,
}

impl NodeRef {
    pub(crate) fn from_id(core: &Arc<TreeCore>, id: NodeId) -> Option<Self> {
        let node = core.arena.get(id)?;
        Some(Self {
            core: Arc::clone(core),
            node,
        })
    }

    pub(crate) fn core(&self) -> &Arc<TreeCore> {
        &self.core
    }

    pub(crate) fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub(crate) fn id(&self) -> NodeId {
        self.node.id()
    }

    /// The name of this node: its entry in the path.
    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// The kind of this node.
    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    /// Is this node a directory (naming contexts and the root)?
    pub fn is_directory(&self) -> bool {
        self.kind() == NodeKind::Directory
    }

    /// Is this node a component leaf?
    pub fn is_component(&self) -> bool {
        self.kind() == NodeKind::Component
    }

    /// Is this node a manager leaf?
    pub fn is_manager(&self) -> bool {
        self.kind() == NodeKind::Manager
    }

    /// Is this node a leaf of any kind?
    pub fn is_leaf(&self) -> bool {
        !self.is_directory()
    }

    /// Is this node a name server: a directory directly below the root?
    pub fn is_nameserver(&self) -> bool {
        if !self.is_directory() {
            return false;
        }
        match self.parent() {
            Some(parent) => parent.name() == "/" && parent.parent_id().is_none(),
            None => false,
        }
    }

    /// View this node as a directory.
    pub fn as_directory(&self) -> Option<DirectoryRef> {
        self.is_directory().then(|| DirectoryRef::new(self.clone()))
    }

    /// View this node as a component.
    pub fn as_component(&self) -> Option<ComponentRef> {
        self.is_component().then(|| ComponentRef::new(self.clone()))
    }

    /// View this node as a manager.
    pub fn as_manager(&self) -> Option<ManagerRef> {
        self.is_manager().then(|| ManagerRef::new(self.clone()))
    }

    /// The raw resolved reference of an unrecognized leaf.
    pub fn as_object(&self) -> Option<ObjectRef> {
        let state = self.node.lock();
        match &state.payload {
            Payload::Unknown(unknown) => Some(Arc::clone(&unknown.handle)),
            _ => None,
        }
    }

    fn parent_id(&self) -> Option<NodeId> {
        self.node.lock().parent
    }

    /// This node's parent, if it has one and it is still in the tree.
    pub fn parent(&self) -> Option<NodeRef> {
        let id = self.parent_id()?;
        NodeRef::from_id(&self.core, id)
    }

    /// The parent's name, or an empty string without a parent.
    pub fn parent_name(&self) -> String {
        self.parent()
            .map(|p| p.name().to_string())
            .unwrap_or_default()
    }

    /// The child nodes of this node.
    pub fn children(&self) -> Vec<NodeRef> {
        let ids: Vec<NodeId> = {
            let state = self.node.lock();
            state.children.values().copied().collect()
        };
        ids.into_iter()
            .filter_map(|id| NodeRef::from_id(&self.core, id))
            .collect()
    }

    /// Is `other` currently a child of this node?
    pub fn is_child(&self, other: &NodeRef) -> bool {
        let state = self.node.lock();
        state.children.get(other.name()) == Some(&other.id())
    }

    /// Is `other` the parent of this node?
    pub fn is_parent(&self, other: &NodeRef) -> bool {
        self.parent().as_ref() == Some(other)
    }

    /// The root of the tree this node is in.
    pub fn root(&self) -> NodeRef {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// The name server this node lives under: its top-most ancestor below
    /// the root. The root itself has none.
    pub fn nameserver(&self) -> Option<NodeRef> {
        let mut current = self.clone();
        loop {
            let parent = current.parent()?;
            if parent.name() == "/" && parent.parent_id().is_none() {
                return Some(current);
            }
            current = parent;
        }
    }

    /// The full path of this node, recomputed from the live parent chain.
    pub fn full_path(&self) -> String {
        let mut names = vec![self.name().to_string()];
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            names.push(parent.name().to_string());
            current = parent;
        }
        names.reverse();

        let mut path = String::new();
        for (i, name) in names.iter().enumerate() {
            if i > 0 && names[i - 1] != "/" {
                path.push('/');
            }
            path.push_str(name);
        }
        path
    }

    /// Depth of this node; the root is depth 0.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Resolve a descendant by path.
    ///
    /// The first element must equal this node's name; the remaining elements
    /// name one child per level. Returns nothing when the path leads out of
    /// the tree.
    pub fn get_node<S: AsRef<str>>(&self, path: &[S]) -> Option<NodeRef> {
        let first = path.first()?;
        if first.as_ref() != self.name() {
            return None;
        }
        let mut current = self.clone();
        for segment in &path[1..] {
            let child_id = {
                let state = current.node.lock();
                state.children.get(segment.as_ref()).copied()
            }?;
            current = NodeRef::from_id(&self.core, child_id)?;
        }
        Some(current)
    }

    /// Does a path exist below this node?
    pub fn has_path<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.get_node(path).is_some()
    }

    /// Attach `child` below this node, unlinking it from any previous parent
    /// first — a node never appears under two parents.
    ///
    /// Fails with [`Error::CannotHoldChildren`] on leaf nodes and with
    /// [`Error::NotRelated`] when `child` belongs to another tree or has
    /// already been removed from this one.
    pub fn add_child(&self, child: &NodeRef) -> Result<()> {
        if !Arc::ptr_eq(&self.core, &child.core) || Arc::ptr_eq(&self.node, &child.node) {
            return Err(Error::not_related(self.name(), child.name()));
        }
        if self.core.arena.get(child.id()).is_none() {
            return Err(Error::not_related(self.name(), child.name()));
        }
        if self.is_leaf() {
            return Err(Error::CannotHoldChildren(self.name().to_string()));
        }

        let old_parent = child.parent_id();
        if let Some(old_id) = old_parent {
            if old_id != self.id() {
                if let Some(old) = self.core.arena.get(old_id) {
                    let mut state = old.lock();
                    if state.children.get(child.name()) == Some(&child.id()) {
                        state.children.remove(child.name());
                    }
                }
            }
        }

        child.node.lock().parent = Some(self.id());
        let replaced = {
            let mut state = self.node.lock();
            state.children.insert(child.name().to_string(), child.id())
        };
        if let Some(old_id) = replaced {
            if old_id != child.id() {
                self.core.free_subtree(old_id);
            }
        }
        Ok(())
    }

    /// Unlink `child` from this node, destroying its subtree.
    ///
    /// Fails with [`Error::NotRelated`] when `child` is not currently a
    /// child of this node.
    pub fn remove_child(&self, child: &NodeRef) -> Result<()> {
        let unlinked = {
            let mut state = self.node.lock();
            match state.children.get(child.name()) {
                Some(&id) if id == child.id() => {
                    state.children.remove(child.name());
                    true
                }
                _ => false,
            }
        };
        if !unlinked {
            return Err(Error::not_related(self.name(), child.name()));
        }
        child.node.lock().parent = None;
        self.core.free_subtree(child.id());
        Ok(())
    }

    /// Depth-first pre-order traversal.
    ///
    /// `visitor` runs on every node where all `filters` hold; the results
    /// come back in visit order. The walk reads the live tree, so re-invoking
    /// after mutations may yield different results.
    pub fn iterate<R>(
        &self,
        visitor: &mut dyn FnMut(&NodeRef) -> R,
        filters: &[NodeFilter],
    ) -> Vec<R> {
        let mut results = Vec::new();
        self.iterate_into(visitor, filters, &mut results);
        results
    }

    fn iterate_into<R>(
        &self,
        visitor: &mut dyn FnMut(&NodeRef) -> R,
        filters: &[NodeFilter],
        out: &mut Vec<R>,
    ) {
        if filters.iter().all(|filter| filter.matches(self)) {
            out.push(visitor(self));
        }
        for child in self.children() {
            child.iterate_into(visitor, filters, out);
        }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// Predicates selecting nodes during [`NodeRef::iterate`].
pub enum NodeFilter {
    Directories,
    Nameservers,
    Managers,
    Components,
    UnknownLeaves,
    Leaves,
    /// An arbitrary predicate.
    Custom(Box<dyn Fn(&NodeRef) -> bool + Send + Sync>),
}

impl NodeFilter {
    fn matches(&self, node: &NodeRef) -> bool {
        match self {
            NodeFilter::Directories => node.is_directory(),
            NodeFilter::Nameservers => node.is_nameserver(),
            NodeFilter::Managers => node.is_manager(),
            NodeFilter::Components => node.is_component(),
            NodeFilter::UnknownLeaves => node.kind() == NodeKind::UnknownLeaf,
            NodeFilter::Leaves => node.is_leaf(),
            NodeFilter::Custom(predicate) => predicate(node),
        }
    }
}

impl fmt::Debug for NodeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeFilter::Directories => "Directories",
            NodeFilter::Nameservers => "Nameservers",
            NodeFilter::Managers => "Managers",
            NodeFilter::Components => "Components",
            NodeFilter::UnknownLeaves => "UnknownLeaves",
            NodeFilter::Leaves => "Leaves",
            NodeFilter::Custom(_) => "Custom(..)",
        };
        write!(f, "NodeFilter::{}", s)
    }
}
