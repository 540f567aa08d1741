//! Pinhole camera (`camera::pinhole`)

use glam::{Vec2, Vec3};
use serde_json::json;

use lumina_core::config;
use lumina_core::geometry::Ray;
use lumina_core::interfaces::Camera;
use lumina_core::{Component, ConfigExt, ConfigValue, ConstructContext, Error, Result};

/// Pinhole camera looking from `position` towards `center`
///
/// `vfov` is the vertical field of view in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Pinhole {
    position: Vec3,
    center: Vec3,
    up: Vec3,
    vfov: f32,
    u: Vec3,
    v: Vec3,
    w: Vec3,
    /// Half the screen height one unit in front of the pinhole
    tf: f32,
}

impl Default for Pinhole {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            center: Vec3::NEG_Z,
            up: Vec3::Y,
            vfov: 30.0,
            u: Vec3::X,
            v: Vec3::Y,
            w: Vec3::Z,
            tf: (30.0_f32.to_radians() * 0.5).tan(),
        }
    }
}

impl Component for Pinhole {
    fn construct(&mut self, config: &ConfigValue, _ctx: &mut ConstructContext<'_>) -> Result<()> {
        let position = config.required_vec3("position")?;
        let center = config.required_vec3("center")?;
        let up = config.required_vec3("up")?;
        let vfov: f32 = config.required("vfov")?;
        if !(vfov > 0.0 && vfov < 180.0) {
            return Err(Error::validation("vfov", "must be within (0, 180) degrees"));
        }

        let w = (position - center)
            .try_normalize()
            .ok_or_else(|| Error::validation("center", "must differ from position"))?;
        let u = up
            .cross(w)
            .try_normalize()
            .ok_or_else(|| Error::validation("up", "must not be parallel to the view direction"))?;

        *self = Self {
            position,
            center,
            up,
            vfov,
            u,
            v: w.cross(u),
            w,
            tf: (vfov.to_radians() * 0.5).tan(),
        };
        Ok(())
    }

    fn serialize(&self) -> Option<ConfigValue> {
        Some(json!({
            "position": config::vec3(self.position),
            "center": config::vec3(self.center),
            "up": config::vec3(self.up),
            "vfov": self.vfov,
        }))
    }

    fn as_camera(&self) -> Option<&(dyn Camera + 'static)> {
        Some(self)
    }
}

impl Camera for Pinhole {
    fn primary_ray(&self, rp: Vec2, aspect_ratio: f32) -> Ray {
        let rp = 2.0 * rp - Vec2::ONE;
        let d = Vec3::new(aspect_ratio * self.tf * rp.x, self.tf * rp.y, -1.0).normalize();
        Ray::new(self.position, self.u * d.x + self.v * d.y + self.w * d.z)
    }

    fn raster_position(&self, wo: Vec3, aspect_ratio: f32) -> Option<Vec2> {
        // Camera space
        let eye = Vec3::new(wo.dot(self.u), wo.dot(self.v), wo.dot(self.w));
        if eye.z >= 0.0 {
            return None;
        }
        let rp = Vec2::new(
            -eye.x / eye.z / self.tf / aspect_ratio,
            -eye.y / eye.z / self.tf,
        ) * 0.5
            + Vec2::splat(0.5);
        (rp.x >= 0.0 && rp.x <= 1.0 && rp.y >= 0.0 && rp.y <= 1.0).then_some(rp)
    }
}
