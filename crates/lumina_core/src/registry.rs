//! Component registry
//!
//! Maps implementation keys to factories. Factories come from the host
//! (builtins, tests) or from plugins; each entry remembers its origin so a
//! plugin's keys can be withdrawn on unload without touching overrides made
//! by somebody else.
//!
//! An override shadows the previous registration instead of dropping it.
//! Withdrawing the override makes the shadowed factory active again, so a
//! plugin that replaces a builtin hands it back when it is unloaded.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::component::{CapabilityKind, Component, ConstructContext, Instance};
use crate::config::ConfigValue;
use crate::error::{Error, Result};
use crate::key::ImplementationKey;
use crate::locator::Locator;
use crate::plugin::PluginId;
use crate::store::InstanceStore;

/// Produces a fresh, unconstructed component
pub type Factory = Arc<dyn Fn() -> Box<dyn Component> + Send + Sync>;

/// Who registered a factory
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Registered directly by the host application
    #[default]
    Host,
    /// Registered by a loaded plugin
    Plugin(PluginId),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Host => f.write_str("host"),
            Origin::Plugin(id) => write!(f, "plugin '{}'", id.name()),
        }
    }
}

/// Behaviour on key collision
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegisterMode {
    /// Fail with `DuplicateKey`
    #[default]
    Reject,
    /// Shadow the existing factory until this one is withdrawn
    Override,
}

#[derive(Clone, Debug, Default)]
pub struct RegisterOptions {
    pub mode: RegisterMode,
    pub origin: Origin,
}

impl RegisterOptions {
    pub fn from_plugin(id: PluginId) -> Self {
        Self {
            mode: RegisterMode::Reject,
            origin: Origin::Plugin(id),
        }
    }

    pub fn overriding(mut self) -> Self {
        self.mode = RegisterMode::Override;
        self
    }
}

struct Registration {
    factory: Factory,
    origin: Origin,
}

/// Registry of component factories keyed by `interface::variant`
///
/// Each key holds a stack of registrations, never empty; the last one is
/// active.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<ImplementationKey, Vec<Registration>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host factory; fails if the key is taken
    pub fn register<F>(&self, key: ImplementationKey, factory: F) -> Result<()>
    where
        F: Fn() -> Box<dyn Component> + Send + Sync + 'static,
    {
        self.register_with(key, Arc::new(factory), RegisterOptions::default())
    }

    pub fn register_with(
        &self,
        key: ImplementationKey,
        factory: Factory,
        options: RegisterOptions,
    ) -> Result<()> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key).and_then(|stack| stack.last()) {
            match options.mode {
                RegisterMode::Reject => return Err(Error::DuplicateKey(key)),
                RegisterMode::Override => {
                    log::info!(
                        "Overriding '{}' (was {}, now {})",
                        key,
                        existing.origin,
                        options.origin
                    );
                }
            }
        } else {
            log::debug!("Registered '{}' from {}", key, options.origin);
        }

        let stack = entries.entry(key).or_default();
        // An origin holds at most one layer per key
        stack.retain(|entry| entry.origin != options.origin);
        stack.push(Registration {
            factory,
            origin: options.origin,
        });
        Ok(())
    }

    /// Instantiate and construct the component registered under `key`
    ///
    /// `locator` is where the caller intends to insert the instance; it is
    /// passed to the component so it can create children underneath.
    pub fn create(
        &self,
        key: &ImplementationKey,
        config: &ConfigValue,
        locator: &Locator,
        store: &InstanceStore,
    ) -> Result<Instance> {
        // Construction may re-enter the registry for children
        let factory = self
            .entries
            .read()
            .get(key)
            .and_then(|stack| stack.last())
            .map(|entry| Arc::clone(&entry.factory))
            .ok_or_else(|| Error::UnknownKey(key.clone()))?;

        let mut component = factory();
        let mut ctx = ConstructContext::new(locator.clone(), self, store);
        component
            .construct(config, &mut ctx)
            .map_err(|e| Error::construction(key.clone(), e))?;

        if let Some(capability) = CapabilityKind::from_interface(key.interface()) {
            if !component.implements(capability) {
                return Err(Error::construction(
                    key.clone(),
                    Error::MissingCapability {
                        locator: locator.clone(),
                        capability,
                    },
                ));
            }
        }

        log::debug!("Created '{}' for {}", key, locator);
        Ok(Instance::created(key.clone(), component, ctx.into_children()))
    }

    /// Drop `key` with every registration it holds
    pub fn unregister(&self, key: &ImplementationKey) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Withdraw the registration `origin` made for `key`
    ///
    /// If it was active, the registration it shadowed (if any) becomes
    /// active again. Returns `false` when `origin` holds no registration
    /// for `key`.
    pub fn unregister_owned(&self, key: &ImplementationKey, origin: &Origin) -> bool {
        let mut entries = self.entries.write();
        let Some(stack) = entries.get_mut(key) else {
            return false;
        };
        let Some(index) = stack.iter().rposition(|entry| entry.origin == *origin) else {
            return false;
        };
        let was_active = index + 1 == stack.len();
        stack.remove(index);

        match stack.last().map(|entry| entry.origin.clone()) {
            None => {
                entries.remove(key);
                log::debug!("Unregistered '{}' from {}", key, origin);
            }
            Some(restored) if was_active => {
                log::info!("Unregistered '{}' from {}, {} is active again", key, origin, restored);
            }
            Some(_) => log::debug!("Dropped shadowed '{}' from {}", key, origin),
        }
        true
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn contains(&self, key: &ImplementationKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Origin of the active registration for `key`
    pub fn origin_of(&self, key: &ImplementationKey) -> Option<Origin> {
        self.entries
            .read()
            .get(key)
            .and_then(|stack| stack.last())
            .map(|entry| entry.origin.clone())
    }

    /// All registered keys, sorted
    pub fn keys(&self) -> Vec<ImplementationKey> {
        let mut keys: Vec<_> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys `origin` holds a registration for, active or shadowed, sorted
    pub fn keys_of(&self, origin: &Origin) -> Vec<ImplementationKey> {
        let mut keys: Vec<_> = self
            .entries
            .read()
            .iter()
            .filter(|(_, stack)| stack.iter().any(|entry| entry.origin == *origin))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("keys", &self.keys()).finish()
    }
}
