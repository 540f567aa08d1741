//! The component contract
//!
//! Every object the registry can instantiate implements [`Component`]:
//! lifecycle hooks, optional serialization and a family of capability
//! queries. A capability query is the safe replacement for a downcast: it
//! returns the narrower interface (material, camera, ...) when the instance
//! implements it and `None` otherwise.

use std::fmt;
use std::sync::Arc;

use crate::config::ConfigValue;
use crate::error::{Error, Result};
use crate::interfaces::{Accel, Camera, Film, Material, Mesh, Model, Renderer, Scene};
use crate::key::ImplementationKey;
use crate::locator::Locator;
use crate::registry::Registry;
use crate::store::InstanceStore;

/// Shared reference to a live component
pub type ComponentRef = Arc<dyn Component>;

/// Base capability of every instantiated object
pub trait Component: Send + Sync + 'static {
    /// Validate `config` and store the fields relevant to this variant
    fn construct(&mut self, config: &ConfigValue, ctx: &mut ConstructContext<'_>) -> Result<()> {
        let _ = (config, ctx);
        Ok(())
    }

    /// Called by the instance store right before the instance is dropped
    fn destruct(&self) {}

    /// Configuration that reconstructs an equivalent instance, if supported
    fn serialize(&self) -> Option<ConfigValue> {
        None
    }

    fn as_material(&self) -> Option<&(dyn Material + 'static)> {
        None
    }

    fn as_mesh(&self) -> Option<&(dyn Mesh + 'static)> {
        None
    }

    fn as_model(&self) -> Option<&(dyn Model + 'static)> {
        None
    }

    fn as_camera(&self) -> Option<&(dyn Camera + 'static)> {
        None
    }

    fn as_accel(&self) -> Option<&(dyn Accel + 'static)> {
        None
    }

    fn as_film(&self) -> Option<&(dyn Film + 'static)> {
        None
    }

    fn as_renderer(&self) -> Option<&(dyn Renderer + 'static)> {
        None
    }

    fn as_scene(&self) -> Option<&(dyn Scene + 'static)> {
        None
    }
}

/// Capability interfaces a component may implement
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityKind {
    Material,
    Mesh,
    Model,
    Camera,
    Accel,
    Film,
    Renderer,
    Scene,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 8] = [
        CapabilityKind::Material,
        CapabilityKind::Mesh,
        CapabilityKind::Model,
        CapabilityKind::Camera,
        CapabilityKind::Accel,
        CapabilityKind::Film,
        CapabilityKind::Renderer,
        CapabilityKind::Scene,
    ];

    /// Interface name used in implementation keys
    pub fn interface_name(&self) -> &'static str {
        match self {
            CapabilityKind::Material => "material",
            CapabilityKind::Mesh => "mesh",
            CapabilityKind::Model => "model",
            CapabilityKind::Camera => "camera",
            CapabilityKind::Accel => "accel",
            CapabilityKind::Film => "film",
            CapabilityKind::Renderer => "renderer",
            CapabilityKind::Scene => "scene",
        }
    }

    /// Capability implied by an interface name, if it names one
    pub fn from_interface(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.interface_name() == name)
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interface_name())
    }
}

/// A narrower interface reachable through a capability query
pub trait Capability: 'static {
    const KIND: CapabilityKind;

    fn query(component: &dyn Component) -> Option<&Self>;
}

macro_rules! impl_capability {
    ($($iface:ident => $kind:ident, $method:ident;)*) => {
        $(
            impl Capability for dyn $iface {
                const KIND: CapabilityKind = CapabilityKind::$kind;

                fn query(component: &dyn Component) -> Option<&Self> {
                    component.$method()
                }
            }
        )*
    };
}

impl_capability! {
    Material => Material, as_material;
    Mesh => Mesh, as_mesh;
    Model => Model, as_model;
    Camera => Camera, as_camera;
    Accel => Accel, as_accel;
    Film => Film, as_film;
    Renderer => Renderer, as_renderer;
    Scene => Scene, as_scene;
}

impl dyn Component {
    /// Capability query, e.g. `component.query::<dyn Material>()`
    pub fn query<C: Capability + ?Sized>(&self) -> Option<&C> {
        C::query(self)
    }

    /// Whether this instance implements `kind`
    pub fn implements(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Material => self.as_material().is_some(),
            CapabilityKind::Mesh => self.as_mesh().is_some(),
            CapabilityKind::Model => self.as_model().is_some(),
            CapabilityKind::Camera => self.as_camera().is_some(),
            CapabilityKind::Accel => self.as_accel().is_some(),
            CapabilityKind::Film => self.as_film().is_some(),
            CapabilityKind::Renderer => self.as_renderer().is_some(),
            CapabilityKind::Scene => self.as_scene().is_some(),
        }
    }

    /// All capabilities this instance implements
    pub fn capabilities(&self) -> Vec<CapabilityKind> {
        CapabilityKind::ALL
            .into_iter()
            .filter(|kind| self.implements(*kind))
            .collect()
    }
}

/// A constructed component waiting to be inserted into the store,
/// together with the children it created while constructing
pub struct Instance {
    key: Option<ImplementationKey>,
    component: Box<dyn Component>,
    children: Vec<(String, Instance)>,
}

impl Instance {
    /// Wrap a component that was not created through the registry
    pub fn new(component: Box<dyn Component>) -> Self {
        Self {
            key: None,
            component,
            children: Vec::new(),
        }
    }

    pub(crate) fn created(
        key: ImplementationKey,
        component: Box<dyn Component>,
        children: Vec<(String, Instance)>,
    ) -> Self {
        Self {
            key: Some(key),
            component,
            children,
        }
    }

    /// Implementation key the instance was created from
    pub fn key(&self) -> Option<&ImplementationKey> {
        self.key.as_ref()
    }

    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// Names of the pending children
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn into_parts(self) -> (Option<ImplementationKey>, Box<dyn Component>, Vec<(String, Instance)>) {
        (self.key, self.component, self.children)
    }
}

impl From<Box<dyn Component>> for Instance {
    fn from(component: Box<dyn Component>) -> Self {
        Self::new(component)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("key", &self.key)
            .field("capabilities", &self.component.capabilities())
            .field("children", &self.child_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Context handed to [`Component::construct`]
///
/// Gives the instance its future locator, read access to the store for
/// resolving weak references, and a way to create owned children. Children
/// are inserted together with their parent, or not at all.
pub struct ConstructContext<'a> {
    locator: Locator,
    registry: &'a Registry,
    store: &'a InstanceStore,
    children: Vec<(String, Instance)>,
}

impl<'a> ConstructContext<'a> {
    /// Context for constructing a component outside [`Registry::create`]
    ///
    /// Children created through it are discarded along with the context.
    pub fn new(locator: Locator, registry: &'a Registry, store: &'a InstanceStore) -> Self {
        Self {
            locator,
            registry,
            store,
            children: Vec::new(),
        }
    }

    /// Locator the instance will be inserted at
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn store(&self) -> &'a InstanceStore {
        self.store
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Create and construct an owned child component
    ///
    /// Returns the locator the child will have once the parent is inserted.
    pub fn create_child(
        &mut self,
        name: &str,
        key: &ImplementationKey,
        config: &ConfigValue,
    ) -> Result<Locator> {
        let locator = self.locator.child(name)?;
        if self.children.iter().any(|(existing, _)| existing == name) {
            return Err(Error::NameCollision(locator));
        }
        let instance = self.registry.create(key, config, &locator, self.store)?;
        self.children.push((name.to_string(), instance));
        Ok(locator)
    }

    pub(crate) fn into_children(self) -> Vec<(String, Instance)> {
        self.children
    }
}
