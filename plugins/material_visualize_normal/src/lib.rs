//! `material::visualize_normal`
//!
//! Reflectance is the absolute value of the shading normal, so surfaces
//! facing along x, y and z come out red, green and blue. Build as a
//! `cdylib` and load with `Session::load_plugin`.

use glam::Vec3;
use lumina_core::geometry::PointGeometry;
use lumina_core::interfaces::Material;
use lumina_core::plugin::PluginRegistrar;
use lumina_core::{Component, ConfigValue};

pub const KEY: &str = "material::visualize_normal";

#[derive(Debug, Default)]
pub struct VisualizeNormal;

impl Component for VisualizeNormal {
    fn serialize(&self) -> Option<ConfigValue> {
        Some(lumina_core::config::empty())
    }

    fn as_material(&self) -> Option<&(dyn Material + 'static)> {
        Some(self)
    }
}

impl Material for VisualizeNormal {
    fn reflectance(&self, geom: &PointGeometry) -> Option<Vec3> {
        Some(geom.n.abs())
    }
}

pub fn register(registrar: &mut PluginRegistrar<'_>) {
    registrar.register(KEY, || Box::new(VisualizeNormal));
}

lumina_core::export_plugin!("material_visualize_normal", register);

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_core::{CapabilityKind, Context, ImplementationKey, Locator};
    use serde_json::json;

    #[test]
    fn test_declaration() {
        let declaration = &lumina_plugin_declaration;
        // SAFETY: the declaration's strings are static and NUL-terminated
        unsafe {
            assert!(declaration.check_compatible().is_ok());
            assert_eq!(declaration.name().as_deref(), Some("material_visualize_normal"));
        }
    }

    #[test]
    fn test_reflectance_is_absolute_normal() {
        let ctx = Context::new();
        let mut registrar = PluginRegistrar::new("material_visualize_normal".into(), ctx.registry());
        register(&mut registrar);
        registrar.finish().unwrap();

        let key = ImplementationKey::parse(KEY).unwrap();
        let loc = ctx.create(&Locator::root(), "normal", &key, &json!({})).unwrap();
        let material = ctx
            .store()
            .resolve_capability(&loc, CapabilityKind::Material)
            .unwrap();

        let geom = PointGeometry {
            n: Vec3::new(0.0, -1.0, 0.0),
            ..Default::default()
        };
        let color = material.as_material().unwrap().reflectance(&geom);
        assert_eq!(color, Some(Vec3::Y));
    }
}
