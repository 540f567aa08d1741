//! # lumina_builtin - reference components
//!
//! Small but complete implementations of every capability so the component
//! substrate can be driven end to end. All of them are registered by
//! [`register`], which is also the entry point of the in-process `builtin`
//! plugin.

pub mod asset_group;
pub mod camera;
pub mod film;
pub mod material;
pub mod mesh;
pub mod model;
pub mod renderer;

pub use asset_group::AssetGroup;
pub use camera::Pinhole;
pub use film::Bitmap;
pub use material::Diffuse;
pub use mesh::RawMesh;
pub use model::WavefrontObj;
pub use renderer::{Blank, Raycast};

use lumina_core::plugin::PluginRegistrar;

/// Register every built-in component, including the scene graph and accelerators
pub fn register(registrar: &mut PluginRegistrar<'_>) {
    lumina_scene::register(registrar);
    registrar.register("asset_group::default", || Box::new(AssetGroup));
    registrar.register("material::diffuse", || Box::new(Diffuse::default()));
    registrar.register("mesh::raw", || Box::new(RawMesh::default()));
    registrar.register("model::wavefrontobj", || Box::new(WavefrontObj::default()));
    registrar.register("camera::pinhole", || Box::new(Pinhole::default()));
    registrar.register("film::bitmap", || Box::new(Bitmap::default()));
    registrar.register("renderer::raycast", || Box::new(Raycast::default()));
    registrar.register("renderer::blank", || Box::new(Blank::default()));
}
