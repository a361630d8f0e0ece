//! Mock remote objects implementing the transport capability traits.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nstree::exec_context::EcKind;
use nstree::ports::Port;
use nstree::transport::{
    ComponentHandle, ComponentProfile, ConfigSetData, ConfigurationHandle, ContextRef,
    ExecContextHandle, ManagerHandle, ObjectHandle, RemoteLifecycle, TransportError,
};

use crate::naming::MockNaming;

/// How a scripted narrow (or initial profile fetch) should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrowFailure {
    /// The reference is stale: the object behind it is gone.
    ObjectNotExist,
    /// The object cannot be reached right now.
    Transient,
}

impl NarrowFailure {
    pub(crate) fn to_error(self, what: &str) -> TransportError {
        match self {
            NarrowFailure::ObjectNotExist => TransportError::ObjectNotExist(what.to_string()),
            NarrowFailure::Transient => TransportError::TransientConnect(what.to_string()),
        }
    }
}

/// An unnarrowed object reference with scripted narrow outcomes.
pub struct MockObject {
    context: Option<Arc<MockNaming>>,
    component: Option<Arc<MockComponent>>,
    manager: Option<Arc<MockManager>>,
    narrow_failure: Option<NarrowFailure>,
}

impl MockObject {
    /// A reference narrowing to a sub-context.
    pub fn context(context: Arc<MockNaming>) -> Self {
        Self {
            context: Some(context),
            component: None,
            manager: None,
            narrow_failure: None,
        }
    }

    /// A reference narrowing to a component.
    pub fn component(component: Arc<MockComponent>) -> Self {
        Self {
            context: None,
            component: Some(component),
            manager: None,
            narrow_failure: None,
        }
    }

    /// A reference narrowing to a manager.
    pub fn manager(manager: Arc<MockManager>) -> Self {
        Self {
            context: None,
            component: None,
            manager: Some(manager),
            narrow_failure: None,
        }
    }

    /// A reference that supports no known interface.
    pub fn opaque() -> Self {
        Self {
            context: None,
            component: None,
            manager: None,
            narrow_failure: None,
        }
    }

    /// A reference whose every narrow fails the given way.
    pub fn broken(failure: NarrowFailure) -> Self {
        Self {
            context: None,
            component: None,
            manager: None,
            narrow_failure: Some(failure),
        }
    }
}

impl ObjectHandle for MockObject {
    fn narrow_context(&self) -> Result<ContextRef, TransportError> {
        if let Some(failure) = self.narrow_failure {
            return Err(failure.to_error("naming context"));
        }
        self.context
            .clone()
            .map(|c| c as ContextRef)
            .ok_or(TransportError::TypeMismatch {
                expected: "naming context",
            })
    }

    fn narrow_component(&self) -> Result<Arc<dyn ComponentHandle>, TransportError> {
        if let Some(failure) = self.narrow_failure {
            return Err(failure.to_error("component"));
        }
        self.component
            .clone()
            .map(|c| c as Arc<dyn ComponentHandle>)
            .ok_or(TransportError::TypeMismatch {
                expected: "component",
            })
    }

    fn narrow_manager(&self) -> Result<Arc<dyn ManagerHandle>, TransportError> {
        if let Some(failure) = self.narrow_failure {
            return Err(failure.to_error("manager"));
        }
        self.manager
            .clone()
            .map(|m| m as Arc<dyn ManagerHandle>)
            .ok_or(TransportError::TypeMismatch {
                expected: "manager",
            })
    }
}

/// Mock execution context.
pub struct MockEc {
    id: u64,
    kind: EcKind,
    rate: f64,
    running: bool,
    owner: Option<String>,
    participants: Vec<String>,
    state: Mutex<RemoteLifecycle>,
    activations: AtomicUsize,
    deactivations: AtomicUsize,
    resets: AtomicUsize,
}

impl MockEc {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            kind: EcKind::Periodic,
            rate: 10.0,
            running: true,
            owner: None,
            participants: Vec::new(),
            state: Mutex::new(RemoteLifecycle::Inactive),
            activations: AtomicUsize::new(0),
            deactivations: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
        }
    }

    pub fn with_kind(mut self, kind: EcKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participants = participants.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_state(self, state: RemoteLifecycle) -> Self {
        *self.state.lock().unwrap() = state;
        self
    }

    /// Overwrite the state the context will report next.
    pub fn set_state(&self, state: RemoteLifecycle) {
        *self.state.lock().unwrap() = state;
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl ExecContextHandle for MockEc {
    fn handle_id(&self) -> u64 {
        self.id
    }

    fn is_running(&self) -> Result<bool, TransportError> {
        Ok(self.running)
    }

    fn rate(&self) -> Result<f64, TransportError> {
        Ok(self.rate)
    }

    fn kind(&self) -> Result<EcKind, TransportError> {
        Ok(self.kind)
    }

    fn owner_name(&self) -> Result<Option<String>, TransportError> {
        Ok(self.owner.clone())
    }

    fn participant_names(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.participants.clone())
    }

    fn activate_component(
        &self,
        _component: &dyn ComponentHandle,
    ) -> Result<(), TransportError> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = RemoteLifecycle::Active;
        Ok(())
    }

    fn deactivate_component(
        &self,
        _component: &dyn ComponentHandle,
    ) -> Result<(), TransportError> {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = RemoteLifecycle::Inactive;
        Ok(())
    }

    fn reset_component(&self, _component: &dyn ComponentHandle) -> Result<(), TransportError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = RemoteLifecycle::Inactive;
        Ok(())
    }

    fn component_state(
        &self,
        _component: &dyn ComponentHandle,
    ) -> Result<RemoteLifecycle, TransportError> {
        Ok(*self.state.lock().unwrap())
    }
}

/// Mock component with per-group fetch counters.
pub struct MockComponent {
    profile: Mutex<ComponentProfile>,
    ports: Mutex<Vec<Port>>,
    owned: Mutex<Vec<Arc<MockEc>>>,
    participating: Mutex<Vec<Arc<MockEc>>>,
    configuration: Arc<MockConfiguration>,
    /// Liveness per context handle id; contexts default to alive.
    dead_in: Mutex<Vec<u64>>,
    fail_profile: Mutex<Option<NarrowFailure>>,
    profile_fetches: AtomicUsize,
    port_fetches: AtomicUsize,
    owned_fetches: AtomicUsize,
    participating_fetches: AtomicUsize,
    exits: AtomicUsize,
}

impl MockComponent {
    pub fn new(instance_name: impl Into<String>) -> Self {
        let profile = ComponentProfile {
            instance_name: instance_name.into(),
            type_name: "MockComponent".to_string(),
            description: "mock component".to_string(),
            version: "1.0".to_string(),
            vendor: "nstree".to_string(),
            category: "test".to_string(),
            parent: None,
            properties: BTreeMap::new(),
        };
        Self {
            profile: Mutex::new(profile),
            ports: Mutex::new(Vec::new()),
            owned: Mutex::new(Vec::new()),
            participating: Mutex::new(Vec::new()),
            configuration: Arc::new(MockConfiguration::new()),
            dead_in: Mutex::new(Vec::new()),
            fail_profile: Mutex::new(None),
            profile_fetches: AtomicUsize::new(0),
            port_fetches: AtomicUsize::new(0),
            owned_fetches: AtomicUsize::new(0),
            participating_fetches: AtomicUsize::new(0),
            exits: AtomicUsize::new(0),
        }
    }

    pub fn set_profile(&self, profile: ComponentProfile) {
        *self.profile.lock().unwrap() = profile;
    }

    pub fn push_port(&self, port: Port) {
        self.ports.lock().unwrap().push(port);
    }

    pub fn add_owned(&self, ec: Arc<MockEc>) {
        self.owned.lock().unwrap().push(ec);
    }

    pub fn add_participating(&self, ec: Arc<MockEc>) {
        self.participating.lock().unwrap().push(ec);
    }

    /// Make the component report dead in the given context.
    pub fn set_dead_in(&self, ec_id: u64) {
        self.dead_in.lock().unwrap().push(ec_id);
    }

    /// Make every profile fetch fail the given way (zombie scripting).
    pub fn fail_profile(&self, failure: NarrowFailure) {
        *self.fail_profile.lock().unwrap() = Some(failure);
    }

    pub fn configuration_mock(&self) -> Arc<MockConfiguration> {
        Arc::clone(&self.configuration)
    }

    pub fn profile_fetches(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }

    pub fn port_fetches(&self) -> usize {
        self.port_fetches.load(Ordering::SeqCst)
    }

    pub fn owned_fetches(&self) -> usize {
        self.owned_fetches.load(Ordering::SeqCst)
    }

    pub fn participating_fetches(&self) -> usize {
        self.participating_fetches.load(Ordering::SeqCst)
    }

    pub fn exits(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }
}

impl ComponentHandle for MockComponent {
    fn profile(&self) -> Result<ComponentProfile, TransportError> {
        if let Some(failure) = *self.fail_profile.lock().unwrap() {
            return Err(failure.to_error("component profile"));
        }
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.profile.lock().unwrap().clone())
    }

    fn ports(&self) -> Result<Vec<Port>, TransportError> {
        self.port_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.ports.lock().unwrap().clone())
    }

    fn owned_contexts(&self) -> Result<Vec<Arc<dyn ExecContextHandle>>, TransportError> {
        self.owned_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .owned
            .lock()
            .unwrap()
            .iter()
            .map(|ec| Arc::clone(ec) as Arc<dyn ExecContextHandle>)
            .collect())
    }

    fn participating_contexts(
        &self,
    ) -> Result<Vec<Arc<dyn ExecContextHandle>>, TransportError> {
        self.participating_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .participating
            .lock()
            .unwrap()
            .iter()
            .map(|ec| Arc::clone(ec) as Arc<dyn ExecContextHandle>)
            .collect())
    }

    fn is_alive_in(&self, context: &dyn ExecContextHandle) -> Result<bool, TransportError> {
        Ok(!self.dead_in.lock().unwrap().contains(&context.handle_id()))
    }

    fn configuration(&self) -> Result<Arc<dyn ConfigurationHandle>, TransportError> {
        Ok(Arc::clone(&self.configuration) as Arc<dyn ConfigurationHandle>)
    }

    fn exit(&self) -> Result<(), TransportError> {
        self.exits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock configuration interface recording write-throughs.
pub struct MockConfiguration {
    sets: Mutex<Vec<ConfigSetData>>,
    active: Mutex<Option<String>>,
    set_fetches: AtomicUsize,
    written: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    activated: Mutex<Vec<String>>,
}

impl MockConfiguration {
    pub fn new() -> Self {
        Self {
            sets: Mutex::new(Vec::new()),
            active: Mutex::new(None),
            set_fetches: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
            activated: Mutex::new(Vec::new()),
        }
    }

    pub fn add_set(&self, set: ConfigSetData) {
        self.sets.lock().unwrap().push(set);
    }

    pub fn set_active(&self, id: impl Into<String>) {
        *self.active.lock().unwrap() = Some(id.into());
    }

    /// The values currently stored for one set.
    pub fn stored_set(&self, id: &str) -> Option<ConfigSetData> {
        self.sets.lock().unwrap().iter().find(|s| s.id == id).cloned()
    }

    pub fn active(&self) -> Option<String> {
        self.active.lock().unwrap().clone()
    }

    pub fn set_fetches(&self) -> usize {
        self.set_fetches.load(Ordering::SeqCst)
    }

    /// Every (set id, values) pushed through `set_configuration_set_values`.
    pub fn written(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.written.lock().unwrap().clone()
    }

    pub fn activated(&self) -> Vec<String> {
        self.activated.lock().unwrap().clone()
    }
}

impl Default for MockConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationHandle for MockConfiguration {
    fn configuration_sets(&self) -> Result<Vec<ConfigSetData>, TransportError> {
        self.set_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.sets.lock().unwrap().clone())
    }

    fn active_configuration_set(&self) -> Result<Option<String>, TransportError> {
        Ok(self.active.lock().unwrap().clone())
    }

    fn activate_configuration_set(&self, id: &str) -> Result<(), TransportError> {
        self.activated.lock().unwrap().push(id.to_string());
        *self.active.lock().unwrap() = Some(id.to_string());
        Ok(())
    }

    fn set_configuration_set_values(
        &self,
        id: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), TransportError> {
        self.written
            .lock()
            .unwrap()
            .push((id.to_string(), data.clone()));
        let mut sets = self.sets.lock().unwrap();
        match sets.iter_mut().find(|s| s.id == id) {
            Some(set) => {
                set.data = data.clone();
                Ok(())
            }
            None => Err(TransportError::ObjectNotExist(id.to_string())),
        }
    }
}

/// Mock manager.
pub struct MockManager {
    profile: Mutex<BTreeMap<String, String>>,
    configuration: Mutex<BTreeMap<String, String>>,
    fail_profile: Mutex<Option<NarrowFailure>>,
    profile_fetches: AtomicUsize,
    configuration_fetches: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl MockManager {
    pub fn new(name: impl Into<String>) -> Self {
        let mut profile = BTreeMap::new();
        profile.insert("instance_name".to_string(), name.into());
        Self {
            profile: Mutex::new(profile),
            configuration: Mutex::new(BTreeMap::new()),
            fail_profile: Mutex::new(None),
            profile_fetches: AtomicUsize::new(0),
            configuration_fetches: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn set_config(&self, name: impl Into<String>, value: impl Into<String>) {
        self.configuration
            .lock()
            .unwrap()
            .insert(name.into(), value.into());
    }

    /// Make every profile fetch fail the given way (zombie scripting).
    pub fn fail_profile(&self, failure: NarrowFailure) {
        *self.fail_profile.lock().unwrap() = Some(failure);
    }

    pub fn profile_fetches(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }

    pub fn configuration_fetches(&self) -> usize {
        self.configuration_fetches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl ManagerHandle for MockManager {
    fn profile(&self) -> Result<BTreeMap<String, String>, TransportError> {
        if let Some(failure) = *self.fail_profile.lock().unwrap() {
            return Err(failure.to_error("manager profile"));
        }
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.profile.lock().unwrap().clone())
    }

    fn configuration(&self) -> Result<BTreeMap<String, String>, TransportError> {
        self.configuration_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.configuration.lock().unwrap().clone())
    }

    fn set_configuration(&self, name: &str, value: &str) -> Result<(), TransportError> {
        self.configuration
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn shutdown(&self) -> Result<(), TransportError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
