//! Narrow interface to the remote transport layer.
//!
//! The tree never speaks a wire protocol itself. Everything remote is reached
//! through the capability traits in this module: a [`Transport`] turns an
//! address into a root [`NamingContext`], contexts resolve names into untyped
//! [`ObjectHandle`]s, and narrowing produces the typed handles
//! ([`ComponentHandle`], [`ManagerHandle`], ...) the rest of the crate
//! operates on. Implementations decide what the calls actually do; every call
//! blocks the calling thread until it completes or fails.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exec_context::EcKind;
use crate::ports::Port;

/// Binding kind tag for manager leaves.
pub const KIND_MANAGER: &str = "mgr";

/// Binding kind tag for component leaves.
pub const KIND_COMPONENT: &str = "cmp";

/// A shared reference to a remote naming context.
pub type ContextRef = Arc<dyn NamingContext>;

/// A shared reference to an unnarrowed remote object.
pub type ObjectRef = Arc<dyn ObjectHandle>;

/// Errors raised by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The name is bound but the object behind it is gone.
    #[error("object no longer exists: {0}")]
    ObjectNotExist(String),

    /// The object could not be reached right now.
    #[error("transient connection failure: {0}")]
    TransientConnect(String),

    /// The reference does not support the requested interface.
    #[error("cannot narrow reference to {expected}")]
    TypeMismatch { expected: &'static str },

    /// Nothing answers at the given address.
    #[error("invalid service: {0}")]
    InvalidService(String),

    /// A remote operation completed with a failure status.
    #[error("remote operation failed: {0}")]
    Operation(StatusCode),

    /// Any other transport failure.
    #[error("transport failure: {0}")]
    Failure(String),
}

/// Failure statuses a remote operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    GeneralError,
    BadParameter,
    Unsupported,
    OutOfResources,
    PreconditionNotMet,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::GeneralError => "general error",
            StatusCode::BadParameter => "bad parameter",
            StatusCode::Unsupported => "unsupported",
            StatusCode::OutOfResources => "out of resources",
            StatusCode::PreconditionNotMet => "precondition not met",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle state of a component as reported by one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteLifecycle {
    Created,
    Inactive,
    Active,
    Error,
    /// A state code outside the known set.
    Unrecognized(u32),
}

/// One name→target entry of a naming context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: BindingName,
    pub target: BindingTarget,
}

/// Whether a binding points at a sub-context or a leaf object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingTarget {
    Context,
    Object,
}

/// A structured binding name: an id plus a kind label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingName {
    pub id: String,
    pub kind: String,
}

impl BindingName {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
        }
    }

    /// Split a path segment such as `motor0.cmp` back into id and kind.
    ///
    /// The kind is everything after the last '.'; a segment without a dot
    /// has an empty id, mirroring how segments are formatted.
    pub fn from_segment(segment: &str) -> Self {
        match segment.rsplit_once('.') {
            Some((id, kind)) => Self::new(id, kind),
            None => Self::new("", segment),
        }
    }
}

impl fmt::Display for BindingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{}.{}", self.id, self.kind)
        }
    }
}

/// Connects to naming services by address.
pub trait Transport: Send + Sync {
    /// Return the root naming context of the service at `address`.
    ///
    /// Fails with [`TransportError::InvalidService`] when nothing answers at
    /// the address, and [`TransportError::TypeMismatch`] when the object that
    /// answers is not a naming context.
    fn root_context(&self, address: &str) -> Result<ContextRef, TransportError>;
}

/// A remote naming context: a directory of bindings.
pub trait NamingContext: Send + Sync {
    /// List up to `page_size` bindings, plus a cursor when more remain.
    fn list(
        &self,
        page_size: u32,
    ) -> Result<(Vec<Binding>, Option<Box<dyn BindingCursor>>), TransportError>;

    /// Resolve one binding to its target object reference.
    fn resolve(&self, name: &BindingName) -> Result<ObjectRef, TransportError>;

    /// Remove one binding. Fails with [`TransportError::ObjectNotExist`]
    /// when the name is not bound.
    fn unbind(&self, name: &BindingName) -> Result<(), TransportError>;
}

/// Server-side pagination cursor over a context's remaining bindings.
pub trait BindingCursor: Send {
    /// Fetch up to `n` more bindings.
    ///
    /// The flag is false once the cursor is exhausted; the batch delivered
    /// alongside a false flag carries no bindings worth processing.
    fn next_n(&mut self, n: u32) -> Result<(bool, Vec<Binding>), TransportError>;

    /// Release the server-side cursor.
    fn destroy(self: Box<Self>);
}

/// An untyped remote object reference, as resolved from a naming context.
///
/// Narrowing fails with `TypeMismatch` when the object does not support the
/// requested interface, with `ObjectNotExist` when the reference is stale,
/// and with `TransientConnect` when the object cannot be reached right now.
pub trait ObjectHandle: Send + Sync {
    fn narrow_context(&self) -> Result<ContextRef, TransportError>;
    fn narrow_component(&self) -> Result<Arc<dyn ComponentHandle>, TransportError>;
    fn narrow_manager(&self) -> Result<Arc<dyn ManagerHandle>, TransportError>;
}

/// Profile data of a remote component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentProfile {
    pub instance_name: String,
    pub type_name: String,
    pub description: String,
    pub version: String,
    pub vendor: String,
    pub category: String,
    /// Instance name of the parent object, when composed under one.
    pub parent: Option<String>,
    /// Extra properties outside the fixed fields.
    pub properties: BTreeMap<String, String>,
}

/// Control interface of a remote component.
pub trait ComponentHandle: Send + Sync {
    fn profile(&self) -> Result<ComponentProfile, TransportError>;

    fn ports(&self) -> Result<Vec<Port>, TransportError>;

    /// Execution contexts this component owns.
    fn owned_contexts(&self) -> Result<Vec<Arc<dyn ExecContextHandle>>, TransportError>;

    /// Execution contexts this component participates in but does not own.
    fn participating_contexts(&self) -> Result<Vec<Arc<dyn ExecContextHandle>>, TransportError>;

    /// Is this component alive in the given context?
    fn is_alive_in(&self, context: &dyn ExecContextHandle) -> Result<bool, TransportError>;

    /// The component's configuration interface.
    fn configuration(&self) -> Result<Arc<dyn ConfigurationHandle>, TransportError>;

    /// Ask the component to shut down its remote object.
    fn exit(&self) -> Result<(), TransportError>;
}

/// Control interface of a remote execution context.
pub trait ExecContextHandle: Send + Sync {
    /// Stable identifier of this context.
    fn handle_id(&self) -> u64;

    fn is_running(&self) -> Result<bool, TransportError>;

    fn rate(&self) -> Result<f64, TransportError>;

    fn kind(&self) -> Result<EcKind, TransportError>;

    /// Instance name of the owning component, when known.
    fn owner_name(&self) -> Result<Option<String>, TransportError>;

    /// Instance names of the participating components.
    fn participant_names(&self) -> Result<Vec<String>, TransportError>;

    fn activate_component(&self, component: &dyn ComponentHandle)
        -> Result<(), TransportError>;

    fn deactivate_component(
        &self,
        component: &dyn ComponentHandle,
    ) -> Result<(), TransportError>;

    fn reset_component(&self, component: &dyn ComponentHandle) -> Result<(), TransportError>;

    /// The component's lifecycle state within this context.
    fn component_state(
        &self,
        component: &dyn ComponentHandle,
    ) -> Result<RemoteLifecycle, TransportError>;
}

/// Stored values of one remote configuration set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSetData {
    pub id: String,
    pub description: String,
    pub data: BTreeMap<String, String>,
}

/// Configuration interface of a remote component.
pub trait ConfigurationHandle: Send + Sync {
    fn configuration_sets(&self) -> Result<Vec<ConfigSetData>, TransportError>;

    /// Name of the active set, or None when no set is active.
    fn active_configuration_set(&self) -> Result<Option<String>, TransportError>;

    fn activate_configuration_set(&self, id: &str) -> Result<(), TransportError>;

    /// Replace the stored values of one set.
    fn set_configuration_set_values(
        &self,
        id: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), TransportError>;
}

/// Control interface of a remote manager.
pub trait ManagerHandle: Send + Sync {
    fn profile(&self) -> Result<BTreeMap<String, String>, TransportError>;

    fn configuration(&self) -> Result<BTreeMap<String, String>, TransportError>;

    /// Set one configuration parameter on the remote manager.
    fn set_configuration(&self, name: &str, value: &str) -> Result<(), TransportError>;

    /// Ask the manager to exit.
    fn shutdown(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_name_display() {
        assert_eq!(BindingName::new("motor0", "cmp").to_string(), "motor0.cmp");
        assert_eq!(BindingName::new("sub", "").to_string(), "sub");
    }

    #[test]
    fn test_binding_name_from_segment() {
        let name = BindingName::from_segment("motor0.cmp");
        assert_eq!(name.id, "motor0");
        assert_eq!(name.kind, "cmp");

        let dotted = BindingName::from_segment("a.b.cmp");
        assert_eq!(dotted.id, "a.b");
        assert_eq!(dotted.kind, "cmp");

        let bare = BindingName::from_segment("manager");
        assert_eq!(bare.id, "");
        assert_eq!(bare.kind, "manager");
    }
}
