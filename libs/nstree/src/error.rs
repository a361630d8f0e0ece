//! Error taxonomy for tree construction, addressing and resource access.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors returned by tree, node and leaf-resource operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A string address or binding name could not be interpreted.
    #[error("bad path: {0}")]
    BadPath(String),

    /// A path used for server selection did not begin at the root.
    #[error("path does not begin at the root: {0}")]
    NonRootPath(String),

    /// Tried to add a child to a leaf node.
    #[error("node '{0}' cannot hold children")]
    CannotHoldChildren(String),

    /// Tried to unlink a node that is not a child of the given parent.
    #[error("'{child}' is not a child of '{parent}'")]
    NotRelated { parent: String, child: String },

    /// An execution-context index was outside the combined
    /// owned + participating range.
    #[error("execution context index {0} is out of range")]
    BadEcIndex(usize),

    /// Referenced a configuration set the component does not have.
    #[error("no such configuration set: {0}")]
    NoSuchConfSet(String),

    /// Referenced a parameter the configuration set does not have.
    #[error("no such configuration parameter: {0}")]
    NoSuchConfParam(String),

    /// Requested an option that was never set and has no default.
    #[error("no such option: {0}")]
    NoSuchOption(String),

    /// Could not reach a naming service at the given address.
    #[error("cannot access {address}: invalid service")]
    InvalidService { address: String },

    /// Connected to an address, but its root object is not a naming context.
    #[error("failed to narrow the root naming context of {address}")]
    FailedToNarrowRoot { address: String },

    /// A remote operation failed below the classification layer.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// Create a NotRelated error from parent and child names.
    pub(crate) fn not_related(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self::NotRelated {
            parent: parent.into(),
            child: child.into(),
        }
    }

    /// Returns true if this error was raised at tree-construction time.
    ///
    /// Callers that want a partially built tree can match on this and keep
    /// going with the servers that did connect.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidService { .. } | Error::FailedToNarrowRoot { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
