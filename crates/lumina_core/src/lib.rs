//! # lumina_core - component substrate of the Lumina renderer
//!
//! Every object the renderer works with (materials, meshes, cameras,
//! accelerators, scenes, renderers) is a [`Component`] created from a
//! configuration tree by a factory registered under an
//! `interface::variant` key. Live instances are owned by an
//! [`InstanceStore`] and addressed by [`Locator`] paths such as
//! `$.assets.camera1`; components refer to each other by locator, never by
//! owning pointer.
//!
//! Factories come from the host or from plugins. See [`plugin`] for the
//! dynamic-library ABI.

pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod geometry;
pub mod interfaces;
pub mod key;
pub mod locator;
pub mod plugin;
pub mod registry;
pub mod store;

pub use component::{Capability, CapabilityKind, Component, ComponentRef, ConstructContext, Instance};
pub use config::{ConfigExt, ConfigValue};
pub use context::Context;
pub use error::{Error, Result};
pub use key::ImplementationKey;
pub use locator::Locator;
pub use registry::{Factory, Origin, RegisterMode, RegisterOptions, Registry};
pub use store::InstanceStore;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::component::{CapabilityKind, Component, ComponentRef, ConstructContext};
    pub use crate::config::{ConfigExt, ConfigValue};
    pub use crate::error::{Error, Result};
    pub use crate::geometry::{PointGeometry, Ray, Triangle};
    pub use crate::interfaces::{
        Accel, Camera, Film, Intersection, Material, Mesh, Model, PrimitiveSpec, Renderer, Scene,
        SceneState,
    };
    pub use crate::key::ImplementationKey;
    pub use crate::locator::Locator;
    pub use crate::plugin::PluginRegistrar;
    pub use crate::registry::Registry;
    pub use crate::store::InstanceStore;
}
