//! Execution-context snapshots.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transport::{ComponentHandle, ExecContextHandle, RemoteLifecycle, TransportError};

/// Scheduling discipline of an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcKind {
    Periodic,
    EventDriven,
    Other,
}

impl fmt::Display for EcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EcKind::Periodic => "periodic",
            EcKind::EventDriven => "event-driven",
            EcKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// An execution context within which components may be running.
///
/// The snapshot fields (kind, rate, running flag, owner, participants) are
/// read once when the reference is parsed and refreshed only by an explicit
/// reparse of the owning component's context group.
#[derive(Clone)]
pub struct ExecContext {
    handle: Arc<dyn ExecContextHandle>,
    handle_id: u64,
    kind: EcKind,
    rate: f64,
    running: bool,
    owner: Option<String>,
    participants: Vec<String>,
}

impl ExecContext {
    /// Snapshot the remote context's attributes.
    pub(crate) fn parse(handle: Arc<dyn ExecContextHandle>) -> Result<Self> {
        let handle_id = handle.handle_id();
        let kind = handle.kind()?;
        let rate = handle.rate()?;
        let running = handle.is_running()?;
        let owner = handle.owner_name()?;
        let participants = handle.participant_names()?;
        Ok(Self {
            handle,
            handle_id,
            kind,
            rate,
            running,
            owner,
            participants,
        })
    }

    /// Stable identifier of this context.
    pub fn handle_id(&self) -> u64 {
        self.handle_id
    }

    pub fn kind(&self) -> EcKind {
        self.kind
    }

    /// Execution rate in hertz.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Was the context running when the snapshot was taken?
    pub fn running(&self) -> bool {
        self.running
    }

    /// Instance name of the owning component, when known.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Instance names of the participating components.
    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    pub(crate) fn handle(&self) -> &dyn ExecContextHandle {
        self.handle.as_ref()
    }

    /// Activate a component within this context.
    pub fn activate_component(&self, component: &dyn ComponentHandle) -> Result<()> {
        self.handle.activate_component(component)?;
        Ok(())
    }

    /// Deactivate a component within this context.
    pub fn deactivate_component(&self, component: &dyn ComponentHandle) -> Result<()> {
        self.handle.deactivate_component(component)?;
        Ok(())
    }

    /// Reset a component within this context.
    pub fn reset_component(&self, component: &dyn ComponentHandle) -> Result<()> {
        self.handle.reset_component(component)?;
        Ok(())
    }

    /// The lifecycle state a component reports within this context.
    pub(crate) fn component_state(
        &self,
        component: &dyn ComponentHandle,
    ) -> std::result::Result<RemoteLifecycle, TransportError> {
        self.handle.component_state(component)
    }
}

impl fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecContext")
            .field("handle_id", &self.handle_id)
            .field("kind", &self.kind)
            .field("rate", &self.rate)
            .field("running", &self.running)
            .field("owner", &self.owner)
            .field("participants", &self.participants)
            .finish_non_exhaustive()
    }
}
