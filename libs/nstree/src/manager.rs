//! Manager leaves.
//!
//! Managers carry two cache groups: a profile property map and a flat
//! configuration map. Both follow the same populate-on-access, invalidate-
//! on-reparse discipline as component groups.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::Result;
use crate::node::{NodeRef, Payload};
use crate::transport::{ManagerHandle, TransportError};

/// Node payload of a manager leaf.
pub(crate) struct ManagerState {
    handle: Arc<dyn ManagerHandle>,
    profile: Option<BTreeMap<String, String>>,
    configuration: Option<BTreeMap<String, String>>,
}

impl ManagerState {
    /// Wrap a narrowed handle, fetching the profile once so stale references
    /// surface at classification time.
    pub(crate) fn parse(
        handle: Arc<dyn ManagerHandle>,
    ) -> std::result::Result<Self, TransportError> {
        let profile = handle.profile()?;
        Ok(Self {
            handle,
            profile: Some(profile),
            configuration: None,
        })
    }

    fn profile(&mut self) -> Result<&BTreeMap<String, String>> {
        if self.profile.is_none() {
            self.profile = Some(self.handle.profile()?);
        }
        Ok(self.profile.as_ref().expect("profile populated"))
    }

    fn configuration(&mut self) -> Result<&BTreeMap<String, String>> {
        if self.configuration.is_none() {
            self.configuration = Some(self.handle.configuration()?);
        }
        Ok(self.configuration.as_ref().expect("configuration populated"))
    }
}

/// View of a node as a manager leaf.
///
/// Obtained from [`NodeRef::as_manager`]; dereferences to the underlying
/// [`NodeRef`] for structural queries.
#[derive(Clone)]
pub struct ManagerRef {
    inner: NodeRef,
}

impl ManagerRef {
    pub(crate) fn new(inner: NodeRef) -> Self {
        Self { inner }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ManagerState) -> Result<R>) -> Result<R> {
        self.update(f)
    }

    fn update<R>(&self, f: impl FnOnce(&mut ManagerState) -> R) -> R {
        let mut guard = self.inner.node().lock();
        match &mut guard.payload {
            Payload::Manager(state) => f(state),
            _ => unreachable!("manager view over non-manager node"),
        }
    }

    /// The manager's profile properties, fetched on first access.
    pub fn profile(&self) -> Result<BTreeMap<String, String>> {
        self.with_state(|state| state.profile().cloned())
    }

    /// The manager's configuration parameters, fetched on first access.
    pub fn configuration(&self) -> Result<BTreeMap<String, String>> {
        self.with_state(|state| state.configuration().cloned())
    }

    /// Set one configuration parameter on the remote manager.
    ///
    /// The configuration group is invalidated so the next access reflects
    /// whatever the manager actually stored.
    pub fn set_config_param(&self, name: &str, value: &str) -> Result<()> {
        self.with_state(|state| {
            state.handle.set_configuration(name, value)?;
            state.configuration = None;
            Ok(())
        })
    }

    /// Ask the manager to exit.
    ///
    /// The node stays in the tree until the parent directory is reparsed.
    pub fn shutdown(&self) -> Result<()> {
        self.with_state(|state| {
            state.handle.shutdown()?;
            Ok(())
        })
    }

    /// Invalidate every cache group.
    pub fn reparse(&self) {
        self.update(|state| {
            state.profile = None;
            state.configuration = None;
        });
    }

    /// Invalidate the profile group.
    pub fn reparse_profile(&self) {
        self.update(|state| state.profile = None);
    }

    /// Invalidate the configuration group.
    pub fn reparse_configuration(&self) {
        self.update(|state| state.configuration = None);
    }
}

impl Deref for ManagerRef {
    type Target = NodeRef;

    fn deref(&self) -> &NodeRef {
        &self.inner
    }
}

impl fmt::Debug for ManagerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerRef")
            .field("name", &self.inner.name())
            .finish_non_exhaustive()
    }
}
