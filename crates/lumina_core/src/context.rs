//! Explicit process context: one registry plus one instance store

use crate::config::ConfigValue;
use crate::error::{Error, Result};
use crate::key::ImplementationKey;
use crate::locator::Locator;
use crate::registry::Registry;
use crate::store::InstanceStore;

/// Owns the registry and the instance store of one rendering session
///
/// A fresh context has nothing registered. Dropping it destroys every live
/// instance before the registry's factories are released.
#[derive(Debug, Default)]
pub struct Context {
    store: InstanceStore,
    registry: Registry,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    /// Create `key` from `config` and insert it as `parent.name`
    pub fn create(
        &self,
        parent: &Locator,
        name: &str,
        key: &ImplementationKey,
        config: &ConfigValue,
    ) -> Result<Locator> {
        let locator = parent.child(name)?;
        if self.store.contains(&locator) {
            return Err(Error::NameCollision(locator));
        }
        let instance = self.registry.create(key, config, &locator, &self.store)?;
        self.store.insert(parent, name, instance)
    }

    /// Create `key` from `config` and swap it in at `locator`
    pub fn recreate(
        &self,
        locator: &Locator,
        key: &ImplementationKey,
        config: &ConfigValue,
    ) -> Result<()> {
        if !self.store.contains(locator) {
            return Err(Error::NotFound(locator.clone()));
        }
        let instance = self.registry.create(key, config, locator, &self.store)?;
        self.store.replace(locator, instance)
    }

    /// Destroy every live instance; registrations are kept
    pub fn reset(&self) -> usize {
        self.store.clear()
    }
}
