//! # nstree
//!
//! Client-side mirror of a distributed naming hierarchy of remote
//! controllable objects (components and managers).
//!
//! A [`Tree`] connects to one or more naming services through an injected
//! [`transport::Transport`] and mirrors each service's context hierarchy as
//! a thread-safe tree. Directories resolve and classify remote bindings into
//! child nodes; leaf nodes wrap remote handles and cache their
//! remote-derived state (profile, ports, execution contexts, configuration
//! sets) lazily, with explicit group-scoped re-synchronization.
//!
//! ## Architecture
//!
//! ```text
//! Tree
//! └── "/" (synthetic root)
//!     ├── "localhost:2809"     Directory (name server)
//!     │   ├── "sub.ctx"        Directory
//!     │   │   └── "motor0.cmp" Component leaf
//!     │   └── "manager.mgr"    Manager leaf
//!     └── "10.0.0.7:2809"      Directory (name server)
//! ```
//!
//! Every node owns its own lock; operations on one node serialize while
//! unrelated subtrees stay available. Remote calls block the calling thread
//! for their duration — there is no event loop and no cancellation.
//!
//! ## Modules
//!
//! - `tree`: the root aggregate and its builder
//! - `node`: generic node handles, traversal and mutation
//! - `directory`: binding resolution and classification
//! - `component` / `manager`: leaf resources with lazy cache groups
//! - `exec_context`, `ports`, `config_set`: leaf sub-state snapshots
//! - `path`: address parsing
//! - `options`: injected tunables
//! - `transport`: the capability interface to the remote layer

mod arena;

pub mod component;
pub mod config_set;
pub mod directory;
pub mod error;
pub mod exec_context;
pub mod manager;
pub mod node;
pub mod options;
pub mod path;
pub mod ports;
pub mod transport;
pub mod tree;

pub use component::{ComponentRef, ResourceState};
pub use config_set::ConfigSet;
pub use directory::DirectoryRef;
pub use error::{Error, Result};
pub use exec_context::{EcKind, ExecContext};
pub use manager::ManagerRef;
pub use node::{NodeFilter, NodeKind, NodeRef};
pub use options::{OptionValue, Options, DEFAULT_MAX_BINDINGS};
pub use path::parse_path;
pub use ports::{Port, PortKind};
pub use transport::ComponentProfile;
pub use tree::{Tree, TreeBuilder, SERVERS_ENV_VAR};
