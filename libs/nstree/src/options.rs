//! Tunable options consulted while mirroring.
//!
//! An [`Options`] value is constructed explicitly (usually through
//! [`TreeBuilder::options`](crate::tree::TreeBuilder::options)) and shared by
//! every consumer inside one tree, so a mutation is observed on the very next
//! access — there is no process-wide registry.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of bindings requested per listing page.
pub const DEFAULT_MAX_BINDINGS: u32 = 100;

/// An option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(u64),
    Str(String),
    Bool(bool),
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Registry of option values with lazy defaults.
#[derive(Debug)]
pub struct Options {
    values: Mutex<BTreeMap<String, OptionValue>>,
}

impl Options {
    /// Option key controlling the listing page size.
    pub const MAX_BINDINGS: &'static str = "max_bindings";

    /// Create a registry holding only the defaults.
    pub fn new() -> Self {
        let mut values = BTreeMap::new();
        values.insert(
            Self::MAX_BINDINGS.to_string(),
            OptionValue::Int(u64::from(DEFAULT_MAX_BINDINGS)),
        );
        Self {
            values: Mutex::new(values),
        }
    }

    /// Look up an option value.
    ///
    /// Fails with [`Error::NoSuchOption`] when the option was never set and
    /// has no default.
    pub fn get(&self, name: &str) -> Result<OptionValue> {
        self.values
            .lock()
            .expect("options lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NoSuchOption(name.to_string()))
    }

    /// Set an option value. Takes effect on the next access.
    pub fn set(&self, name: impl Into<String>, value: impl Into<OptionValue>) {
        self.values
            .lock()
            .expect("options lock poisoned")
            .insert(name.into(), value.into());
    }

    /// The listing page size, falling back to the default when the option
    /// holds a non-integer value.
    pub(crate) fn max_bindings(&self) -> u32 {
        match self.get(Self::MAX_BINDINGS) {
            Ok(OptionValue::Int(n)) => u32::try_from(n).unwrap_or(DEFAULT_MAX_BINDINGS),
            _ => DEFAULT_MAX_BINDINGS,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_present() {
        let options = Options::new();
        assert_eq!(
            options.get(Options::MAX_BINDINGS).unwrap(),
            OptionValue::Int(100)
        );
        assert_eq!(options.max_bindings(), 100);
    }

    #[test]
    fn test_unknown_option_fails() {
        let options = Options::new();
        assert!(matches!(
            options.get("page_colour"),
            Err(Error::NoSuchOption(name)) if name == "page_colour"
        ));
    }

    #[test]
    fn test_mutation_is_observed_on_next_access() {
        let options = Options::new();
        options.set(Options::MAX_BINDINGS, 5u64);
        assert_eq!(options.max_bindings(), 5);

        options.set("trace_resolution", true);
        assert_eq!(
            options.get("trace_resolution").unwrap(),
            OptionValue::Bool(true)
        );
    }
}
