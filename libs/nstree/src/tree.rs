//! The tree aggregate: root node, name servers and tree-wide queries.

use std::env;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::directory::{parse_context, DirectoryState};
use crate::error::{Error, Result};
use crate::node::{create_node, NodeFilter, NodeKind, NodeRef, Payload, TreeCore};
use crate::options::Options;
use crate::transport::{Transport, TransportError};

/// Environment variable holding a ';'-separated list of naming-service
/// addresses, consulted when no explicit server is configured.
pub const SERVERS_ENV_VAR: &str = "NSTREE_SERVERS";

/// A mirror of one or more naming services.
///
/// The tree owns a synthetic root named `/`; each configured server becomes
/// a directory directly below it, resolved recursively at attach time.
/// Handles into the tree stay valid across reparses (see [`NodeRef`]).
pub struct Tree {
    core: Arc<TreeCore>,
    root: NodeRef,
    transport: Arc<dyn Transport>,
}

impl Tree {
    /// Start configuring a tree.
    pub fn builder() -> TreeBuilder {
        TreeBuilder {
            servers: Vec::new(),
            paths: Vec::new(),
            options: Options::new(),
        }
    }

    /// The options shared by every consumer inside this tree.
    pub fn options(&self) -> &Options {
        &self.core.options
    }

    /// The synthetic root node.
    pub fn root(&self) -> NodeRef {
        self.root.clone()
    }

    /// Connect to a naming service and mirror it below the root.
    ///
    /// An existing server node with the same address is replaced. Connection
    /// failures surface as [`Error::InvalidService`] /
    /// [`Error::FailedToNarrowRoot`] so callers can keep a partially built
    /// tree and move on to the next address.
    pub fn add_name_server(&self, address: &str) -> Result<()> {
        let context = self
            .transport
            .root_context(address)
            .map_err(|err| match err {
                TransportError::InvalidService(_) => Error::InvalidService {
                    address: address.to_string(),
                },
                TransportError::TypeMismatch { .. } => Error::FailedToNarrowRoot {
                    address: address.to_string(),
                },
                other => Error::Transport(other),
            })?;
        info!(address, "adding name server");

        let server = create_node(
            &self.core,
            address,
            Some(self.root.id()),
            Payload::Directory(DirectoryState {
                context: Some(Arc::clone(&context)),
            }),
        );
        let parsed = {
            let mut guard = server.node().lock();
            parse_context(&self.core, server.id(), &mut guard, server.name(), &context)
        };
        if let Err(err) = parsed {
            self.core.free_subtree(server.id());
            return Err(err);
        }

        let replaced = {
            let mut guard = self.root.node().lock();
            guard.children.insert(address.to_string(), server.id())
        };
        if let Some(old_id) = replaced {
            self.core.free_subtree(old_id);
        }
        Ok(())
    }

    /// Add every server listed in [`SERVERS_ENV_VAR`].
    ///
    /// A missing or empty variable adds nothing.
    pub fn load_servers_from_env(&self) -> Result<()> {
        let Ok(list) = env::var(SERVERS_ENV_VAR) else {
            return Ok(());
        };
        for address in list.split(';').filter(|s| !s.is_empty()) {
            self.add_name_server(address)?;
        }
        Ok(())
    }

    /// Resolve a node by path; the first segment must be `/`.
    pub fn get_node<S: AsRef<str>>(&self, path: &[S]) -> Option<NodeRef> {
        self.root.get_node(path)
    }

    /// Does the tree contain a node at `path`?
    pub fn has_path<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.root.has_path(path)
    }

    /// Depth-first pre-order traversal over the whole tree.
    pub fn iterate<R>(
        &self,
        visitor: &mut dyn FnMut(&NodeRef) -> R,
        filters: &[NodeFilter],
    ) -> Vec<R> {
        self.root.iterate(visitor, filters)
    }

    /// The kind of the node at `path`, when present.
    pub fn kind_at<S: AsRef<str>>(&self, path: &[S]) -> Option<NodeKind> {
        self.get_node(path).map(|node| node.kind())
    }

    /// Is the node at `path` a component?
    pub fn is_component<S: AsRef<str>>(&self, path: &[S]) -> bool {
        matches!(self.kind_at(path), Some(NodeKind::Component))
    }

    /// Is the node at `path` a directory?
    pub fn is_directory<S: AsRef<str>>(&self, path: &[S]) -> bool {
        matches!(self.kind_at(path), Some(NodeKind::Directory))
    }

    /// Is the node at `path` a manager?
    pub fn is_manager<S: AsRef<str>>(&self, path: &[S]) -> bool {
        matches!(self.kind_at(path), Some(NodeKind::Manager))
    }

    /// Is the node at `path` a name server?
    pub fn is_nameserver<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.get_node(path)
            .map(|node| node.is_nameserver())
            .unwrap_or(false)
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("servers", &self.root.children().len())
            .finish_non_exhaustive()
    }
}

/// Configures and connects a [`Tree`].
#[derive(Debug)]
pub struct TreeBuilder {
    servers: Vec<String>,
    paths: Vec<Vec<String>>,
    options: Options,
}

impl TreeBuilder {
    /// Mirror the naming service at `address`.
    pub fn server(mut self, address: impl Into<String>) -> Self {
        self.servers.push(address.into());
        self
    }

    /// Mirror every naming service in `addresses`.
    pub fn servers<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Select a server from a parsed path: the segment after the leading
    /// `/` names the server. Paths not rooted at `/` fail the build with
    /// [`Error::NonRootPath`].
    pub fn path<S: AsRef<str>>(mut self, path: &[S]) -> Self {
        self.paths
            .push(path.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    /// Replace the default options.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Connect through `transport` and resolve every configured server.
    ///
    /// With no explicit servers and no paths, addresses come from
    /// [`SERVERS_ENV_VAR`].
    pub fn build(self, transport: Arc<dyn Transport>) -> Result<Tree> {
        let core = Arc::new(TreeCore::new(self.options));
        let root = create_node(
            &core,
            "/",
            None,
            Payload::Directory(DirectoryState { context: None }),
        );
        let tree = Tree {
            core,
            root,
            transport,
        };

        let mut addresses = self.servers;
        for path in &self.paths {
            match path.first().map(String::as_str) {
                Some("/") => {
                    if let Some(server) = path.get(1) {
                        addresses.push(server.clone());
                    }
                }
                _ => return Err(Error::NonRootPath(path.join("/"))),
            }
        }

        if addresses.is_empty() {
            tree.load_servers_from_env()?;
        } else {
            for address in &addresses {
                tree.add_name_server(address)?;
            }
        }
        Ok(tree)
    }
}
