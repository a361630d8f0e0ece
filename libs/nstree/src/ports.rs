//! Port snapshots and kind tags.
//!
//! Ports are plain data fetched in one batch from a component; the
//! input/output/service/connected views are filters over that one list,
//! never separately cached.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    /// Receives data from other ports.
    Input,
    /// Publishes data to other ports.
    Output,
    /// Exposes a service interface.
    Service,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortKind::Input => "input",
            PortKind::Output => "output",
            PortKind::Service => "service",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of one port of a remote component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub kind: PortKind,
    /// Ids of the connectors currently attached to this port.
    pub connectors: Vec<String>,
    pub properties: BTreeMap<String, String>,
}

impl Port {
    /// Is this port connected to one or more other ports?
    pub fn is_connected(&self) -> bool {
        !self.connectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_predicate() {
        let mut port = Port {
            name: "out".to_string(),
            kind: PortKind::Output,
            connectors: Vec::new(),
            properties: BTreeMap::new(),
        };
        assert!(!port.is_connected());

        port.connectors.push("conn-0".to_string());
        assert!(port.is_connected());
    }
}
