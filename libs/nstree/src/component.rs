//! Component leaves: lazy cache groups, status merging and context
//! addressing.
//!
//! A component node caches five groups of remote-derived state — profile,
//! ports, owned contexts, participating contexts and configuration sets —
//! each populated on first access and invalidated independently. All remote
//! fetches happen under the node's lock, so concurrent readers of one
//! component serialize while the rest of the tree stays available.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config_set::ConfigSet;
use crate::error::{Error, Result};
use crate::exec_context::ExecContext;
use crate::node::{NodeRef, Payload};
use crate::ports::{Port, PortKind};
use crate::transport::{
    ComponentHandle, ComponentProfile, ConfigurationHandle, RemoteLifecycle, TransportError,
};

/// Merged lifecycle status of a component across its execution contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Created,
    Inactive,
    Active,
    Error,
    Unknown,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceState::Created => "created",
            ResourceState::Inactive => "inactive",
            ResourceState::Active => "active",
            ResourceState::Error => "error",
            ResourceState::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Fold one context state into the running merge.
///
/// Worst status wins: Error dominates everything, then Active, then
/// Inactive, then Created. An accumulator outside the four known states
/// stays Unknown.
fn merge_states(current: ResourceState, new: ResourceState) -> ResourceState {
    use ResourceState::*;
    match (current, new) {
        (_, Error) => Error,
        (current, Active) if current != Error => Active,
        (current, Inactive) if !matches!(current, Active | Error) => Inactive,
        (current, Created) if !matches!(current, Active | Error | Inactive) => Created,
        (Unknown, _) => Unknown,
        (current, _) => current,
    }
}

/// Merge all per-context states into one overall status.
///
/// No contexts at all is Unknown — deliberately distinct from "contexts
/// exist but are all Created".
fn merged_state(owned: &[ResourceState], participating: &[ResourceState]) -> ResourceState {
    if owned.is_empty() && participating.is_empty() {
        return ResourceState::Unknown;
    }
    owned
        .iter()
        .chain(participating)
        .fold(ResourceState::Created, |current, &new| {
            merge_states(current, new)
        })
}

/// The state a component reports within one context.
fn fetch_ec_state(handle: &dyn ComponentHandle, ec: &ExecContext) -> Result<ResourceState> {
    if !handle.is_alive_in(ec.handle())? {
        return Ok(ResourceState::Created);
    }
    let state = match ec.component_state(handle)? {
        RemoteLifecycle::Active => ResourceState::Active,
        RemoteLifecycle::Error => ResourceState::Error,
        RemoteLifecycle::Inactive => ResourceState::Inactive,
        RemoteLifecycle::Created | RemoteLifecycle::Unrecognized(_) => ResourceState::Unknown,
    };
    Ok(state)
}

/// Node payload of a component leaf.
pub(crate) struct ComponentState {
    handle: Arc<dyn ComponentHandle>,
    caches: ComponentCaches,
}

#[derive(Default)]
struct ComponentCaches {
    profile: Option<ComponentProfile>,
    ports: Option<Vec<Port>>,
    owned: Option<Vec<ExecContext>>,
    owned_states: Option<Vec<ResourceState>>,
    participating: Option<Vec<ExecContext>>,
    participating_states: Option<Vec<ResourceState>>,
    conf: Option<ConfCache>,
}

struct ConfCache {
    handle: Arc<dyn ConfigurationHandle>,
    sets: BTreeMap<String, ConfigSet>,
    active: Option<String>,
}

/// Index into the combined owned ++ participating sequence, rebased.
enum EcSlot {
    Owned(usize),
    Participating(usize),
}

impl ComponentState {
    /// Wrap a narrowed handle, fetching the profile once so stale references
    /// surface at classification time.
    pub(crate) fn parse(
        handle: Arc<dyn ComponentHandle>,
    ) -> std::result::Result<Self, TransportError> {
        let profile = handle.profile()?;
        Ok(Self {
            handle,
            caches: ComponentCaches {
                profile: Some(profile),
                ..ComponentCaches::default()
            },
        })
    }

    fn profile(&mut self) -> Result<&ComponentProfile> {
        if self.caches.profile.is_none() {
            self.caches.profile = Some(self.handle.profile()?);
        }
        Ok(self.caches.profile.as_ref().expect("profile populated"))
    }

    fn ports(&mut self) -> Result<&[Port]> {
        if self.caches.ports.is_none() {
            self.caches.ports = Some(self.handle.ports()?);
        }
        Ok(self.caches.ports.as_deref().expect("ports populated"))
    }

    fn populate_owned(&mut self) -> Result<()> {
        if self.caches.owned.is_none() {
            let contexts = self
                .handle
                .owned_contexts()?
                .into_iter()
                .map(ExecContext::parse)
                .collect::<Result<Vec<_>>>()?;
            self.caches.owned = Some(contexts);
        }
        Ok(())
    }

    fn populate_participating(&mut self) -> Result<()> {
        if self.caches.participating.is_none() {
            let contexts = self
                .handle
                .participating_contexts()?
                .into_iter()
                .map(ExecContext::parse)
                .collect::<Result<Vec<_>>>()?;
            self.caches.participating = Some(contexts);
        }
        Ok(())
    }

    fn owned(&mut self) -> Result<&[ExecContext]> {
        self.populate_owned()?;
        Ok(self.caches.owned.as_deref().expect("owned populated"))
    }

    fn participating(&mut self) -> Result<&[ExecContext]> {
        self.populate_participating()?;
        Ok(self
            .caches
            .participating
            .as_deref()
            .expect("participating populated"))
    }

    fn owned_states(&mut self) -> Result<&[ResourceState]> {
        if self.caches.owned_states.is_none() {
            self.populate_owned()?;
            let contexts = self.caches.owned.as_deref().expect("owned populated");
            let mut states = Vec::with_capacity(contexts.len());
            for ec in contexts {
                states.push(fetch_ec_state(self.handle.as_ref(), ec)?);
            }
            self.caches.owned_states = Some(states);
        }
        Ok(self
            .caches
            .owned_states
            .as_deref()
            .expect("owned states populated"))
    }

    fn participating_states(&mut self) -> Result<&[ResourceState]> {
        if self.caches.participating_states.is_none() {
            self.populate_participating()?;
            let contexts = self
                .caches
                .participating
                .as_deref()
                .expect("participating populated");
            let mut states = Vec::with_capacity(contexts.len());
            for ec in contexts {
                states.push(fetch_ec_state(self.handle.as_ref(), ec)?);
            }
            self.caches.participating_states = Some(states);
        }
        Ok(self
            .caches
            .participating_states
            .as_deref()
            .expect("participating states populated"))
    }

    /// Rebase a combined index into one of the two context lists.
    fn resolve_slot(&mut self, index: usize) -> Result<EcSlot> {
        let owned_len = self.owned()?.len();
        if index < owned_len {
            return Ok(EcSlot::Owned(index));
        }
        let rebased = index - owned_len;
        if rebased < self.participating()?.len() {
            Ok(EcSlot::Participating(rebased))
        } else {
            Err(Error::BadEcIndex(index))
        }
    }

    fn ec_at(&mut self, index: usize) -> Result<ExecContext> {
        let slot = self.resolve_slot(index)?;
        let ec = match slot {
            EcSlot::Owned(i) => &self.caches.owned.as_deref().expect("owned populated")[i],
            EcSlot::Participating(i) => {
                &self
                    .caches
                    .participating
                    .as_deref()
                    .expect("participating populated")[i]
            }
        };
        Ok(ec.clone())
    }

    fn conf(&mut self) -> Result<&mut ConfCache> {
        if self.caches.conf.is_none() {
            let handle = self.handle.configuration()?;
            let mut sets = BTreeMap::new();
            for data in handle.configuration_sets()? {
                sets.insert(data.id.clone(), ConfigSet::new(data, Arc::clone(&handle)));
            }
            let active = handle.active_configuration_set()?;
            self.caches.conf = Some(ConfCache {
                handle,
                sets,
                active,
            });
        }
        Ok(self.caches.conf.as_mut().expect("configuration populated"))
    }
}

/// View of a node as a component leaf.
///
/// Obtained from [`NodeRef::as_component`]; dereferences to the underlying
/// [`NodeRef`] for structural queries.
#[derive(Clone)]
pub struct ComponentRef {
    inner: NodeRef,
}

impl ComponentRef {
    pub(crate) fn new(inner: NodeRef) -> Self {
        Self { inner }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ComponentState) -> Result<R>) -> Result<R> {
        self.update(f)
    }

    fn update<R>(&self, f: impl FnOnce(&mut ComponentState) -> R) -> R {
        let mut guard = self.inner.node().lock();
        match &mut guard.payload {
            Payload::Component(state) => f(state),
            _ => unreachable!("component view over non-component node"),
        }
    }

    // Profile ------------------------------------------------------------

    /// The component's profile, fetched on first access.
    pub fn profile(&self) -> Result<ComponentProfile> {
        self.with_state(|state| state.profile().cloned())
    }

    // Execution contexts and status ---------------------------------------

    /// Execution contexts this component owns.
    pub fn owned_ecs(&self) -> Result<Vec<ExecContext>> {
        self.with_state(|state| state.owned().map(<[_]>::to_vec))
    }

    /// Execution contexts this component participates in.
    pub fn participating_ecs(&self) -> Result<Vec<ExecContext>> {
        self.with_state(|state| state.participating().map(<[_]>::to_vec))
    }

    /// Last-known state of the component in each owned context.
    pub fn owned_ec_states(&self) -> Result<Vec<ResourceState>> {
        self.with_state(|state| state.owned_states().map(<[_]>::to_vec))
    }

    /// Last-known state of the component in each participating context.
    pub fn participating_ec_states(&self) -> Result<Vec<ResourceState>> {
        self.with_state(|state| state.participating_states().map(<[_]>::to_vec))
    }

    /// The merged state of all execution contexts: the overall status of
    /// this component. One erroring context marks the whole component Error;
    /// a component with no contexts at all is Unknown.
    pub fn state(&self) -> Result<ResourceState> {
        self.with_state(|state| {
            state.owned_states()?;
            state.participating_states()?;
            let owned = state
                .caches
                .owned_states
                .as_deref()
                .expect("owned states populated");
            let participating = state
                .caches
                .participating_states
                .as_deref()
                .expect("participating states populated");
            Ok(merged_state(owned, participating))
        })
    }

    /// Cached state of the component in the context at `index`.
    ///
    /// The index runs over owned contexts first, then participating ones;
    /// out-of-range indices fail with [`Error::BadEcIndex`].
    pub fn state_in_ec(&self, index: usize) -> Result<ResourceState> {
        self.with_state(|state| {
            let slot = state.resolve_slot(index)?;
            match slot {
                EcSlot::Owned(i) => Ok(state.owned_states()?[i]),
                EcSlot::Participating(i) => Ok(state.participating_states()?[i]),
            }
        })
    }

    /// Re-fetch the state of the component in the context at `index`,
    /// updating the cached value.
    pub fn refresh_state_in_ec(&self, index: usize) -> Result<ResourceState> {
        self.with_state(|state| {
            let slot = state.resolve_slot(index)?;
            match slot {
                EcSlot::Owned(i) => {
                    state.owned_states()?;
                    let ec = state.caches.owned.as_deref().expect("owned populated")[i].clone();
                    let fresh = fetch_ec_state(state.handle.as_ref(), &ec)?;
                    state
                        .caches
                        .owned_states
                        .as_mut()
                        .expect("owned states populated")[i] = fresh;
                    Ok(fresh)
                }
                EcSlot::Participating(i) => {
                    state.participating_states()?;
                    let ec = state
                        .caches
                        .participating
                        .as_deref()
                        .expect("participating populated")[i]
                        .clone();
                    let fresh = fetch_ec_state(state.handle.as_ref(), &ec)?;
                    state
                        .caches
                        .participating_states
                        .as_mut()
                        .expect("participating states populated")[i] = fresh;
                    Ok(fresh)
                }
            }
        })
    }

    /// Activate this component in the context at `index`.
    pub fn activate_in_ec(&self, index: usize) -> Result<()> {
        self.with_state(|state| {
            let ec = state.ec_at(index)?;
            ec.activate_component(state.handle.as_ref())
        })
    }

    /// Deactivate this component in the context at `index`.
    pub fn deactivate_in_ec(&self, index: usize) -> Result<()> {
        self.with_state(|state| {
            let ec = state.ec_at(index)?;
            ec.deactivate_component(state.handle.as_ref())
        })
    }

    /// Reset this component in the context at `index`.
    pub fn reset_in_ec(&self, index: usize) -> Result<()> {
        self.with_state(|state| {
            let ec = state.ec_at(index)?;
            ec.reset_component(state.handle.as_ref())
        })
    }

    /// Find the combined index of the context with the given handle id.
    pub fn get_ec_index(&self, handle_id: u64) -> Result<Option<usize>> {
        self.with_state(|state| {
            let position = state
                .owned()?
                .iter()
                .position(|ec| ec.handle_id() == handle_id);
            if let Some(i) = position {
                return Ok(Some(i));
            }
            let owned_len = state.owned()?.len();
            let position = state
                .participating()?
                .iter()
                .position(|ec| ec.handle_id() == handle_id);
            Ok(position.map(|i| owned_len + i))
        })
    }

    /// Is this component alive in at least one of its known contexts?
    pub fn alive(&self) -> Result<bool> {
        self.with_state(|state| {
            state.populate_owned()?;
            state.populate_participating()?;
            let owned = state.caches.owned.as_deref().expect("owned populated");
            let participating = state
                .caches
                .participating
                .as_deref()
                .expect("participating populated");
            for ec in owned.iter().chain(participating) {
                if state.handle.is_alive_in(ec.handle())? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    /// Ask the component to shut down its remote object.
    ///
    /// The node stays in the tree until the parent directory is reparsed.
    pub fn exit(&self) -> Result<()> {
        self.with_state(|state| {
            state.handle.exit()?;
            Ok(())
        })
    }

    // Ports ---------------------------------------------------------------

    /// All ports of this component, fetched on first access.
    pub fn ports(&self) -> Result<Vec<Port>> {
        self.with_state(|state| state.ports().map(<[_]>::to_vec))
    }

    fn ports_where(&self, keep: impl Fn(&Port) -> bool) -> Result<Vec<Port>> {
        self.with_state(|state| {
            Ok(state
                .ports()?
                .iter()
                .filter(|port| keep(port))
                .cloned()
                .collect())
        })
    }

    /// All input ports.
    pub fn inports(&self) -> Result<Vec<Port>> {
        self.ports_where(|p| p.kind == PortKind::Input)
    }

    /// All output ports.
    pub fn outports(&self) -> Result<Vec<Port>> {
        self.ports_where(|p| p.kind == PortKind::Output)
    }

    /// All service ports.
    pub fn svcports(&self) -> Result<Vec<Port>> {
        self.ports_where(|p| p.kind == PortKind::Service)
    }

    /// All ports with at least one connection.
    pub fn connected_ports(&self) -> Result<Vec<Port>> {
        self.ports_where(Port::is_connected)
    }

    /// Connected input ports.
    pub fn connected_inports(&self) -> Result<Vec<Port>> {
        self.ports_where(|p| p.kind == PortKind::Input && p.is_connected())
    }

    /// Connected output ports.
    pub fn connected_outports(&self) -> Result<Vec<Port>> {
        self.ports_where(|p| p.kind == PortKind::Output && p.is_connected())
    }

    /// Connected service ports.
    pub fn connected_svcports(&self) -> Result<Vec<Port>> {
        self.ports_where(|p| p.kind == PortKind::Service && p.is_connected())
    }

    /// Find a port by name.
    pub fn get_port_by_name(&self, name: &str) -> Result<Option<Port>> {
        self.with_state(|state| Ok(state.ports()?.iter().find(|p| p.name == name).cloned()))
    }

    /// Does this component have a port with the given name?
    pub fn has_port_by_name(&self, name: &str) -> Result<bool> {
        Ok(self.get_port_by_name(name)?.is_some())
    }

    // Configuration sets ---------------------------------------------------

    /// The component's configuration sets, keyed by name.
    pub fn conf_sets(&self) -> Result<BTreeMap<String, ConfigSet>> {
        self.with_state(|state| Ok(state.conf()?.sets.clone()))
    }

    /// Name of the currently-active configuration set.
    pub fn active_conf_set_name(&self) -> Result<Option<String>> {
        self.with_state(|state| Ok(state.conf()?.active.clone()))
    }

    /// The currently-active configuration set.
    pub fn active_conf_set(&self) -> Result<Option<ConfigSet>> {
        self.with_state(|state| {
            let conf = state.conf()?;
            let Some(active) = conf.active.clone() else {
                return Ok(None);
            };
            Ok(conf.sets.get(&active).cloned())
        })
    }

    /// Activate a configuration set by name.
    ///
    /// Fails with [`Error::NoSuchConfSet`] when the set is unknown locally.
    pub fn activate_conf_set(&self, set_name: &str) -> Result<()> {
        self.with_state(|state| {
            let conf = state.conf()?;
            if !conf.sets.contains_key(set_name) {
                return Err(Error::NoSuchConfSet(set_name.to_string()));
            }
            conf.handle.activate_configuration_set(set_name)?;
            Ok(())
        })
    }

    /// Set one parameter of one configuration set, updating the local cache
    /// and writing through to the remote configuration object.
    ///
    /// Fails with [`Error::NoSuchConfSet`] / [`Error::NoSuchConfParam`] when
    /// the set or parameter is unknown locally; nothing is mutated then.
    pub fn set_conf_set_value(&self, set_name: &str, param: &str, value: &str) -> Result<()> {
        self.with_state(|state| {
            let conf = state.conf()?;
            let set = conf
                .sets
                .get_mut(set_name)
                .ok_or_else(|| Error::NoSuchConfSet(set_name.to_string()))?;
            if !set.has_param(param) {
                return Err(Error::NoSuchConfParam(param.to_string()));
            }
            set.set_param(param, value)
        })
    }

    // Reparsing ------------------------------------------------------------

    /// Invalidate every cache group. Each is re-fetched on its next access.
    pub fn reparse(&self) {
        self.update(|state| state.caches = ComponentCaches::default());
    }

    /// Invalidate the profile group.
    pub fn reparse_profile(&self) {
        self.update(|state| state.caches.profile = None);
    }

    /// Invalidate the port list.
    pub fn reparse_ports(&self) {
        self.update(|state| state.caches.ports = None);
    }

    /// Invalidate the owned execution contexts and their states.
    pub fn reparse_owned_ecs(&self) {
        self.update(|state| {
            state.caches.owned = None;
            state.caches.owned_states = None;
        });
    }

    /// Invalidate the participating execution contexts and their states.
    pub fn reparse_participating_ecs(&self) {
        self.update(|state| {
            state.caches.participating = None;
            state.caches.participating_states = None;
        });
    }

    /// Invalidate both execution-context groups.
    pub fn reparse_ecs(&self) {
        self.reparse_owned_ecs();
        self.reparse_participating_ecs();
    }

    /// Invalidate the configuration sets.
    pub fn reparse_conf_sets(&self) {
        self.update(|state| state.caches.conf = None);
    }
}

impl Deref for ComponentRef {
    type Target = NodeRef;

    fn deref(&self) -> &NodeRef {
        &self.inner
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("name", &self.inner.name())
            .finish_non_exhaustive()
    }
}
