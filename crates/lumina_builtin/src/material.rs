//! Lambertian material (`material::diffuse`)

use glam::Vec3;
use serde_json::json;

use lumina_core::config;
use lumina_core::geometry::PointGeometry;
use lumina_core::interfaces::Material;
use lumina_core::{Component, ConfigExt, ConfigValue, ConstructContext, Result};

/// Constant diffuse reflectance `Kd`, white by default
#[derive(Debug, Clone, PartialEq)]
pub struct Diffuse {
    kd: Vec3,
}

impl Default for Diffuse {
    fn default() -> Self {
        Self { kd: Vec3::ONE }
    }
}

impl Component for Diffuse {
    fn construct(&mut self, config: &ConfigValue, _ctx: &mut ConstructContext<'_>) -> Result<()> {
        self.kd = config.optional_vec3("Kd")?.unwrap_or(Vec3::ONE);
        Ok(())
    }

    fn serialize(&self) -> Option<ConfigValue> {
        Some(json!({ "Kd": config::vec3(self.kd) }))
    }

    fn as_material(&self) -> Option<&(dyn Material + 'static)> {
        Some(self)
    }
}

impl Material for Diffuse {
    fn reflectance(&self, _geom: &PointGeometry) -> Option<Vec3> {
        Some(self.kd)
    }
}
