//! Named vault backends available to a selector.

use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::Vault;
use trove_common::{Error, Result};

/// Registry of vault backends by name.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Vault>>,
}

impl BackendRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register a backend.
    ///
    /// # Preconditions
    /// - `name` must be unique within the registry
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, name: impl Into<String>, vault: Arc<dyn Vault>) -> Result<()> {
        let name = name.into();
        if self.backends.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "backend '{}' is already registered",
                name
            )));
        }
        self.backends.insert(name, vault);
        Ok(())
    }

    /// Resolve a backend by name.
    ///
    /// # Errors
    /// - Backend not registered
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Vault>> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotExist(format!("backend '{}' is not registered", name)))
    }

    /// Get the registered backend names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a backend is registered.
    pub fn has_backend(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
