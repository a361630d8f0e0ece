//! Mock naming service: transport, contexts and the pagination cursor.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nstree::transport::{
    Binding, BindingCursor, BindingName, BindingTarget, ContextRef, NamingContext, ObjectRef,
    Transport, TransportError, KIND_COMPONENT, KIND_MANAGER,
};

use crate::objects::{MockComponent, MockManager, MockObject, NarrowFailure};

/// Mock transport mapping addresses to scripted root contexts.
pub struct MockTransport {
    servers: Mutex<BTreeMap<String, ServerEntry>>,
}

enum ServerEntry {
    Context(Arc<MockNaming>),
    NotAContext,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            servers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register an empty naming service at `address` and return its root
    /// context for scripting.
    pub fn add_server(&self, address: impl Into<String>) -> Arc<MockNaming> {
        let context = Arc::new(MockNaming::new());
        self.servers
            .lock()
            .unwrap()
            .insert(address.into(), ServerEntry::Context(Arc::clone(&context)));
        context
    }

    /// Register an address whose root object is not a naming context.
    pub fn add_unnarrowable_server(&self, address: impl Into<String>) {
        self.servers
            .lock()
            .unwrap()
            .insert(address.into(), ServerEntry::NotAContext);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn root_context(&self, address: &str) -> Result<ContextRef, TransportError> {
        match self.servers.lock().unwrap().get(address) {
            Some(ServerEntry::Context(context)) => Ok(Arc::clone(context) as ContextRef),
            Some(ServerEntry::NotAContext) => Err(TransportError::TypeMismatch {
                expected: "naming context",
            }),
            None => Err(TransportError::InvalidService(address.to_string())),
        }
    }
}

struct Entry {
    name: BindingName,
    target: BindingTarget,
    object: Arc<MockObject>,
}

impl Entry {
    fn binding(&self) -> Binding {
        Binding {
            name: self.name.clone(),
            target: self.target,
        }
    }
}

/// Mock naming context holding an ordered list of bindings.
pub struct MockNaming {
    entries: Mutex<Vec<Entry>>,
    page_requests: Arc<Mutex<Vec<u32>>>,
    destroyed_cursors: Arc<AtomicUsize>,
}

impl MockNaming {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            page_requests: Arc::new(Mutex::new(Vec::new())),
            destroyed_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn bind(&self, name: BindingName, target: BindingTarget, object: MockObject) {
        self.entries.lock().unwrap().push(Entry {
            name,
            target,
            object: Arc::new(object),
        });
    }

    /// Bind a fresh sub-context and return it for scripting.
    pub fn bind_context(&self, id: &str, kind: &str) -> Arc<MockNaming> {
        let sub = Arc::new(MockNaming::new());
        self.bind(
            BindingName::new(id, kind),
            BindingTarget::Context,
            MockObject::context(Arc::clone(&sub)),
        );
        sub
    }

    /// Bind a component under `id` with the `cmp` kind tag.
    pub fn bind_component(&self, id: &str, component: &Arc<MockComponent>) {
        self.bind(
            BindingName::new(id, KIND_COMPONENT),
            BindingTarget::Object,
            MockObject::component(Arc::clone(component)),
        );
    }

    /// Bind a manager under `id` with the `mgr` kind tag.
    pub fn bind_manager(&self, id: &str, manager: &Arc<MockManager>) {
        self.bind(
            BindingName::new(id, KIND_MANAGER),
            BindingTarget::Object,
            MockObject::manager(Arc::clone(manager)),
        );
    }

    /// Bind an object with an unrecognized kind tag.
    pub fn bind_opaque(&self, id: &str, kind: &str) {
        self.bind(
            BindingName::new(id, kind),
            BindingTarget::Object,
            MockObject::opaque(),
        );
    }

    /// Bind an object whose every narrow fails the given way.
    pub fn bind_broken(&self, id: &str, kind: &str, failure: NarrowFailure) {
        self.bind(
            BindingName::new(id, kind),
            BindingTarget::Object,
            MockObject::broken(failure),
        );
    }

    /// Is a name still bound in this context?
    pub fn contains(&self, id: &str, kind: &str) -> bool {
        let name = BindingName::new(id, kind);
        self.entries.lock().unwrap().iter().any(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every page size requested through `list` / `next_n`, in order.
    pub fn page_requests(&self) -> Vec<u32> {
        self.page_requests.lock().unwrap().clone()
    }

    /// How many pagination cursors have been destroyed.
    pub fn destroyed_cursors(&self) -> usize {
        self.destroyed_cursors.load(Ordering::SeqCst)
    }
}

impl Default for MockNaming {
    fn default() -> Self {
        Self::new()
    }
}

impl NamingContext for MockNaming {
    fn list(
        &self,
        page_size: u32,
    ) -> Result<(Vec<Binding>, Option<Box<dyn BindingCursor>>), TransportError> {
        self.page_requests.lock().unwrap().push(page_size);
        let bindings: Vec<Binding> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(Entry::binding)
            .collect();
        let page = page_size as usize;
        if bindings.len() <= page {
            Ok((bindings, None))
        } else {
            let first = bindings[..page].to_vec();
            let rest = bindings[page..].to_vec();
            let cursor = MockCursor {
                remaining: rest,
                page_requests: Arc::clone(&self.page_requests),
                destroyed: Arc::clone(&self.destroyed_cursors),
            };
            Ok((first, Some(Box::new(cursor))))
        }
    }

    fn resolve(&self, name: &BindingName) -> Result<ObjectRef, TransportError> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| &e.name == name)
            .map(|e| Arc::clone(&e.object) as ObjectRef)
            .ok_or_else(|| TransportError::ObjectNotExist(name.to_string()))
    }

    fn unbind(&self, name: &BindingName) -> Result<(), TransportError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.iter().position(|e| &e.name == name) {
            Some(index) => {
                entries.remove(index);
                Ok(())
            }
            None => Err(TransportError::ObjectNotExist(name.to_string())),
        }
    }
}

struct MockCursor {
    remaining: Vec<Binding>,
    page_requests: Arc<Mutex<Vec<u32>>>,
    destroyed: Arc<AtomicUsize>,
}

impl BindingCursor for MockCursor {
    fn next_n(&mut self, n: u32) -> Result<(bool, Vec<Binding>), TransportError> {
        self.page_requests.lock().unwrap().push(n);
        if self.remaining.is_empty() {
            return Ok((false, Vec::new()));
        }
        let take = (n as usize).min(self.remaining.len());
        let batch: Vec<Binding> = self.remaining.drain(..take).collect();
        Ok((true, batch))
    }

    fn destroy(self: Box<Self>) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}
