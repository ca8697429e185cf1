//! Process-wide adapter lookup.
//!
//! Built once at startup from the compiled-in site adapters, read-only
//! for the remainder of the process's life. There is deliberately no
//! way to mutate a registry after construction.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::sites;
use super::SiteAdapter;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate adapter id '{0}'")]
    DuplicateId(String),
}

/// Immutable id → adapter map.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    /// Builds a registry from an explicit adapter list. Duplicate ids
    /// are a startup error, not a silent overwrite.
    pub fn build(adapters: Vec<Arc<dyn SiteAdapter>>) -> Result<Self, RegistryError> {
        let mut map: HashMap<String, Arc<dyn SiteAdapter>> = HashMap::new();
        for adapter in adapters {
            let id = adapter.manifest().id.clone();
            if map.insert(id.clone(), adapter).is_some() {
                return Err(RegistryError::DuplicateId(id));
            }
        }
        Ok(Self { adapters: map })
    }

    /// Registry over every compiled-in site adapter.
    pub fn with_builtin_sites() -> Result<Self, RegistryError> {
        Self::build(sites::all())
    }

    pub fn get(&self, adapter_id: &str) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters.get(adapter_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_sites_register_uniquely() {
        let registry = AdapterRegistry::with_builtin_sites().unwrap();
        assert!(!registry.is_empty());
        assert!(registry.get("brass-house").is_some());
        assert!(registry.get("ammo-lake").is_some());
        assert!(registry.get("no-such-adapter").is_none());
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let a = sites::all();
        let mut doubled = sites::all();
        doubled.extend(a);
        assert!(matches!(
            AdapterRegistry::build(doubled),
            Err(RegistryError::DuplicateId(_))
        ));
    }
}
