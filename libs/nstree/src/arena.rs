//! Generational arena holding every node of a tree.
//!
//! Parent/child relations are stored as [`NodeId`] fields rather than live
//! references, so unlinking a subtree is a metadata update and no reference
//! cycles exist. Generations detect ids whose slot has since been freed and
//! reused: a stale id simply resolves to nothing.

use std::sync::{Arc, RwLock};

/// Stable identifier of a node within its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    entry: Option<Arc<T>>,
}

/// Slot table with a free list.
///
/// The lock here guards allocation and lookup only; everything a node owns
/// is guarded by that node's own lock.
pub(crate) struct Arena<T> {
    inner: RwLock<ArenaInner<T>>,
}

struct ArenaInner<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(ArenaInner {
                slots: Vec::new(),
                free: Vec::new(),
            }),
        }
    }

    /// Allocate a slot and build its entry from the id it will live under.
    pub(crate) fn insert_with(&self, build: impl FnOnce(NodeId) -> T) -> NodeId {
        let mut inner = self.inner.write().expect("arena lock poisoned");
        match inner.free.pop() {
            Some(index) => {
                let generation = inner.slots[index as usize].generation;
                let id = NodeId { index, generation };
                inner.slots[index as usize].entry = Some(Arc::new(build(id)));
                id
            }
            None => {
                let index = u32::try_from(inner.slots.len()).expect("arena exhausted");
                let id = NodeId {
                    index,
                    generation: 0,
                };
                inner.slots.push(Slot {
                    generation: 0,
                    entry: Some(Arc::new(build(id))),
                });
                id
            }
        }
    }

    /// Resolve an id, returning nothing for freed or reused slots.
    pub(crate) fn get(&self, id: NodeId) -> Option<Arc<T>> {
        let inner = self.inner.read().expect("arena lock poisoned");
        let slot = inner.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.clone()
    }

    /// Free a slot, invalidating the id.
    pub(crate) fn remove(&self, id: NodeId) -> Option<Arc<T>> {
        let mut inner = self.inner.write().expect("arena lock poisoned");
        let slot = inner.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation || slot.entry.is_none() {
            return None;
        }
        let entry = slot.entry.take();
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(id.index);
        entry
    }
}
