//! Append-only name → captured reference table.
//!
//! [`RegistryBuilder`] only grows and rejects duplicate names;
//! [`RegistryBuilder::freeze`] turns it into a [`Registry`], which has no
//! mutating API at all.

use indexmap::IndexMap;
use indexmap::map::Entry;
use primordials_realm::Value;

use crate::error::{BootstrapError, BootstrapResult};

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: IndexMap<String, Value>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name`. An existing entry is never replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> BootstrapResult<()> {
        match self.entries.entry(name.into()) {
            Entry::Occupied(entry) => Err(BootstrapError::DuplicateEntry(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::trace!(name = %entry.key(), "registered");
                entry.insert(value);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn freeze(self) -> Registry {
        tracing::debug!(entries = self.entries.len(), "registry frozen");
        Registry {
            entries: self.entries,
        }
    }
}

/// The frozen registry. Iteration follows insertion order.
#[derive(Debug)]
pub struct Registry {
    entries: IndexMap<String, Value>,
}

impl Registry {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Like [`Registry::get`] but a missing name is a bootstrap error
    pub fn require(&self, name: &str) -> BootstrapResult<&Value> {
        self.entries
            .get(name)
            .ok_or_else(|| BootstrapError::missing("primordials", name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.insert("MathPI", Value::from(std::f64::consts::PI)).unwrap();
        let err = builder.insert("MathPI", Value::from(3.0)).unwrap_err();
        assert!(matches!(err, BootstrapError::DuplicateEntry(name) if name == "MathPI"));
        assert_eq!(
            builder.get("MathPI").and_then(|v| v.as_number()),
            Some(std::f64::consts::PI)
        );
    }

    #[test]
    fn test_frozen_registry_keeps_order() {
        let mut builder = RegistryBuilder::new();
        for name in ["b", "a", "c"] {
            builder.insert(name, Value::undefined()).unwrap();
        }
        let registry = builder.freeze();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert!(registry.require("zzz").is_err());
    }
}
