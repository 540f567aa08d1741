//! # lumina_scene - scene graph and acceleration structures
//!
//! Provides the `scene::default` component and two accelerators,
//! `accel::linear` and `accel::bvh`.

pub mod bvh;
pub mod linear;
pub mod scene;

pub use bvh::BvhAccel;
pub use linear::LinearAccel;
pub use scene::{SceneGraph, RAY_EPSILON};

use lumina_core::plugin::PluginRegistrar;

/// Register the scene graph and accelerators
pub fn register(registrar: &mut PluginRegistrar<'_>) {
    registrar.register("scene::default", || Box::new(SceneGraph::default()));
    registrar.register("accel::linear", || Box::new(LinearAccel::default()));
    registrar.register("accel::bvh", || Box::new(BvhAccel::default()));
}
