//! Configuration-set snapshots with write-through mutation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::transport::{ConfigSetData, ConfigurationHandle};

/// A named, remotely-stored parameter map.
///
/// Mutation goes through the owning component
/// ([`ComponentRef::set_conf_set_value`](crate::component::ComponentRef::set_conf_set_value)),
/// which keeps the local cache and the remote set in step; there are no
/// local-only edits.
#[derive(Clone)]
pub struct ConfigSet {
    id: String,
    description: String,
    data: BTreeMap<String, String>,
    handle: Arc<dyn ConfigurationHandle>,
}

impl ConfigSet {
    pub(crate) fn new(data: ConfigSetData, handle: Arc<dyn ConfigurationHandle>) -> Self {
        Self {
            id: data.id,
            description: data.description,
            data: data.data,
            handle,
        }
    }

    /// Name of this configuration set.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The set's parameters and their values.
    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    /// Does this set hold the given parameter?
    pub fn has_param(&self, param: &str) -> bool {
        self.data.contains_key(param)
    }

    /// Update one parameter locally and push the whole set to the remote
    /// configuration object.
    pub(crate) fn set_param(&mut self, param: &str, value: &str) -> Result<()> {
        self.data.insert(param.to_string(), value.to_string());
        self.handle
            .set_configuration_set_values(&self.id, &self.data)?;
        Ok(())
    }
}

impl fmt::Debug for ConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSet")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
