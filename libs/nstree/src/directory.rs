//! Directory nodes: mirroring one remote naming context.
//!
//! A directory's children are rebuilt from the context's bindings, fetched
//! in bounded pages. Bindings classify into sub-directories (resolved
//! recursively), manager/component leaves (narrowed and profiled, with
//! stale references skipped) or unknown leaves.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::arena::NodeId;
use crate::component::ComponentState;
use crate::error::{Error, Result};
use crate::manager::ManagerState;
use crate::node::{create_node, NodeRef, NodeState, Payload, TreeCore, UnknownState};
use crate::transport::{
    Binding, BindingName, BindingTarget, ContextRef, TransportError, KIND_COMPONENT, KIND_MANAGER,
};

/// Node payload of a directory.
///
/// The synthetic root is a directory without a context.
pub(crate) struct DirectoryState {
    pub(crate) context: Option<ContextRef>,
}

/// View of a node as a directory.
///
/// Obtained from [`NodeRef::as_directory`]; dereferences to the underlying
/// [`NodeRef`] for structural queries.
#[derive(Clone)]
pub struct DirectoryRef {
    inner: NodeRef,
}

impl DirectoryRef {
    pub(crate) fn new(inner: NodeRef) -> Self {
        Self { inner }
    }

    /// Rebuild the subtree below this directory from its remote context.
    ///
    /// The whole child subtree is discarded and re-resolved; the rebuild is
    /// not incremental and takes unbounded time on large contexts. On the
    /// synthetic root this re-parses each name-server directory in turn.
    pub fn reparse(&self) -> Result<()> {
        debug!(directory = %self.inner.full_path(), "reparsing directory");
        let core = Arc::clone(self.inner.core());
        let node = Arc::clone(self.inner.node());
        let mut guard = node.lock();
        let context = match &guard.payload {
            Payload::Directory(dir) => dir.context.clone(),
            _ => unreachable!("directory view over non-directory node"),
        };
        match context {
            Some(context) => {
                let child_ids: Vec<NodeId> = guard.children.values().copied().collect();
                guard.children.clear();
                for id in child_ids {
                    core.free_subtree(id);
                }
                parse_context(&core, node.id(), &mut guard, node.name(), &context)
            }
            None => {
                drop(guard);
                for child in self.inner.children() {
                    if let Some(dir) = child.as_directory() {
                        dir.reparse()?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Remove a binding from the remote context represented by this
    /// directory.
    ///
    /// The name uses the path form, e.g. `motor0.cmp` or `manager.mgr`.
    /// Fails with [`Error::BadPath`] when the name is not bound. The local
    /// tree is left untouched; reparse to observe the removal.
    pub fn unbind(&self, name: &str) -> Result<()> {
        let guard = self.inner.node().lock();
        let context = match &guard.payload {
            Payload::Directory(dir) => dir.context.clone(),
            _ => unreachable!("directory view over non-directory node"),
        };
        let Some(context) = context else {
            return Err(Error::BadPath(name.to_string()));
        };
        let binding_name = BindingName::from_segment(name);
        match context.unbind(&binding_name) {
            Ok(()) => Ok(()),
            Err(TransportError::ObjectNotExist(_)) => Err(Error::BadPath(name.to_string())),
            Err(err) => Err(err.into()),
        }
    }
}

impl Deref for DirectoryRef {
    type Target = NodeRef;

    fn deref(&self) -> &NodeRef {
        &self.inner
    }
}

impl fmt::Debug for DirectoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryRef")
            .field("name", &self.inner.name())
            .finish_non_exhaustive()
    }
}

/// Fill a directory's children from its remote context, page by page.
///
/// Runs under the directory's lock; child nodes are created and parsed
/// before being linked in, so lock acquisition is strictly parent before
/// child.
pub(crate) fn parse_context(
    core: &Arc<TreeCore>,
    dir_id: NodeId,
    state: &mut NodeState,
    dir_name: &str,
    context: &ContextRef,
) -> Result<()> {
    let (bindings, cursor) = context.list(core.options.max_bindings())?;
    for binding in bindings {
        process_binding(core, dir_id, state, dir_name, context, binding)?;
    }
    if let Some(mut cursor) = cursor {
        loop {
            // Re-read the page size so an option change applies mid-listing.
            let (more, batch) = cursor.next_n(core.options.max_bindings())?;
            if !more {
                break;
            }
            for binding in batch {
                process_binding(core, dir_id, state, dir_name, context, binding)?;
            }
        }
        cursor.destroy();
    }
    Ok(())
}

/// Classify one binding and attach the resulting child node.
fn process_binding(
    core: &Arc<TreeCore>,
    dir_id: NodeId,
    state: &mut NodeState,
    dir_name: &str,
    context: &ContextRef,
    binding: Binding,
) -> Result<()> {
    let name = binding.name.to_string();
    match binding.target {
        BindingTarget::Context => {
            let obj = context.resolve(&binding.name)?;
            let sub_context = obj.narrow_context()?;
            let child = create_node(
                core,
                name.clone(),
                Some(dir_id),
                Payload::Directory(DirectoryState {
                    context: Some(Arc::clone(&sub_context)),
                }),
            );
            let parsed = {
                let mut child_guard = child.node().lock();
                parse_context(
                    core,
                    child.id(),
                    &mut child_guard,
                    child.name(),
                    &sub_context,
                )
            };
            if let Err(err) = parsed {
                core.free_subtree(child.id());
                return Err(err);
            }
            state.children.insert(name, child.id());
        }
        BindingTarget::Object => match binding.name.kind.as_str() {
            KIND_MANAGER => {
                let obj = context.resolve(&binding.name)?;
                match obj.narrow_manager().and_then(ManagerState::parse) {
                    Ok(manager) => {
                        let child =
                            create_node(core, name.clone(), Some(dir_id), Payload::Manager(manager));
                        state.children.insert(name, child.id());
                    }
                    Err(err) if is_zombie(&err) => {
                        warn!(
                            name = %name,
                            directory = %dir_name,
                            error = %err,
                            "skipping zombie manager binding"
                        );
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            KIND_COMPONENT => {
                let obj = context.resolve(&binding.name)?;
                match obj.narrow_component().and_then(ComponentState::parse) {
                    Ok(component) => {
                        let child = create_node(
                            core,
                            name.clone(),
                            Some(dir_id),
                            Payload::Component(component),
                        );
                        state.children.insert(name, child.id());
                    }
                    Err(err) if is_zombie(&err) => {
                        warn!(
                            name = %name,
                            directory = %dir_name,
                            error = %err,
                            "skipping zombie component binding"
                        );
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            _ => {
                // Unrecognized kind: keep the raw reference as a plain leaf.
                let obj = context.resolve(&binding.name)?;
                let child = create_node(
                    core,
                    name.clone(),
                    Some(dir_id),
                    Payload::Unknown(UnknownState { handle: obj }),
                );
                state.children.insert(name, child.id());
            }
        },
    }
    Ok(())
}

/// A binding whose object is gone or unreachable right now.
fn is_zombie(err: &TransportError) -> bool {
    matches!(
        err,
        TransportError::ObjectNotExist(_) | TransportError::TransientConnect(_)
    )
}
