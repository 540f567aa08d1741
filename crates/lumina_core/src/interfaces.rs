//! Capability interfaces
//!
//! A component exposes these through the `as_*` queries on
//! [`Component`](crate::component::Component). Rendering code never
//! downcasts; it resolves a locator and asks for the interface it needs.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::component::{CapabilityKind, ComponentRef};
use crate::error::Result;
use crate::geometry::{PointGeometry, Ray, Triangle};
use crate::locator::Locator;
use crate::store::InstanceStore;

/// Surface reflectance model
pub trait Material: Send + Sync {
    /// Reflectance at a surface point, `None` when undefined there
    fn reflectance(&self, geom: &PointGeometry) -> Option<Vec3>;

    fn is_specular(&self, _geom: &PointGeometry) -> bool {
        false
    }
}

/// Triangle mesh
pub trait Mesh: Send + Sync {
    fn triangle_count(&self) -> usize;

    fn triangle(&self, face: usize) -> Option<Triangle>;

    /// Surface point on `face` at barycentric coordinates `uv`
    fn surface_point(&self, face: usize, uv: Vec2) -> Option<PointGeometry> {
        self.triangle(face).map(|tri| tri.surface_point(uv))
    }

    fn triangles(&self) -> Vec<Triangle> {
        (0..self.triangle_count())
            .filter_map(|face| self.triangle(face))
            .collect()
    }
}

/// A mesh paired with the material used to shade it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPrimitive {
    pub mesh: Locator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Locator>,
}

/// A set of mesh/material pairs, usually loaded from a file
pub trait Model: Send + Sync {
    fn primitives(&self) -> Vec<ModelPrimitive>;
}

pub trait Camera: Send + Sync {
    /// Primary ray through raster position `rp` in `[0,1]^2`
    fn primary_ray(&self, rp: Vec2, aspect_ratio: f32) -> Ray;

    /// Raster position seen along direction `wo`, `None` outside the view
    fn raster_position(&self, _wo: Vec3, _aspect_ratio: f32) -> Option<Vec2> {
        None
    }
}

/// Triangles belonging to one scene primitive, as handed to an accelerator
#[derive(Clone, Debug, Default)]
pub struct AccelGeometry {
    pub primitive: usize,
    pub triangles: Vec<Triangle>,
}

/// Closest hit reported by an accelerator
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccelHit {
    pub t: f32,
    pub uv: Vec2,
    pub primitive: usize,
    pub face: usize,
}

/// Spatial index over scene triangles
pub trait Accel: Send + Sync {
    /// Replace the index contents with `geometry`
    fn build(&self, geometry: &[AccelGeometry]) -> Result<()>;

    /// Closest hit with `t` in `(tmin, tmax)`
    fn intersect(&self, ray: &Ray, tmin: f32, tmax: f32) -> Option<AccelHit>;

    /// Identifies the current index contents; every `build` takes a fresh
    /// value from [`next_accel_generation`]. Zero means never built.
    fn generation(&self) -> u64;
}

static ACCEL_GENERATION: AtomicU64 = AtomicU64::new(0);

/// Process-wide unique, non-zero build generation
pub fn next_accel_generation() -> u64 {
    ACCEL_GENERATION.fetch_add(1, Ordering::Relaxed) + 1
}

/// Film dimensions in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilmSize {
    pub w: u32,
    pub h: u32,
}

/// Snapshot of a film's contents, RGB interleaved, row 0 at the bottom
#[derive(Clone, Debug, PartialEq)]
pub struct FilmBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl FilmBuffer {
    pub fn pixel(&self, x: u32, y: u32) -> Option<Vec3> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = 3 * (y as usize * self.width as usize + x as usize);
        Some(Vec3::new(self.data[i], self.data[i + 1], self.data[i + 2]))
    }
}

pub trait Film: Send + Sync {
    fn size(&self) -> FilmSize;

    fn aspect_ratio(&self) -> f32 {
        let size = self.size();
        size.w as f32 / size.h as f32
    }

    /// Write a pixel; out-of-range coordinates are ignored
    fn set_pixel(&self, x: u32, y: u32, color: Vec3);

    /// Write a full row; extra entries are ignored
    fn set_row(&self, y: u32, colors: &[Vec3]) {
        for (x, color) in colors.iter().enumerate() {
            self.set_pixel(x as u32, y, *color);
        }
    }

    fn clear(&self);

    fn buffer(&self) -> FilmBuffer;
}

pub trait Renderer: Send + Sync {
    /// Render into the configured output, resolving inputs through `store`
    fn render(&self, store: &InstanceStore) -> Result<()>;
}

/// What a scene primitive refers to
///
/// Exactly one of `camera`, `model` or `mesh` should be set; `material`
/// only accompanies `mesh`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<Locator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Locator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<Locator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Locator>,
}

impl PrimitiveSpec {
    pub fn camera(camera: Locator) -> Self {
        Self {
            camera: Some(camera),
            ..Self::default()
        }
    }

    pub fn model(model: Locator) -> Self {
        Self {
            model: Some(model),
            ..Self::default()
        }
    }

    pub fn mesh(mesh: Locator, material: Option<Locator>) -> Self {
        Self {
            mesh: Some(mesh),
            material,
            ..Self::default()
        }
    }
}

/// Lifecycle of a scene graph
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneState {
    /// No primitives
    Empty,
    /// Primitives added since the last successful build
    Populated,
    /// Spatial index reflects every primitive
    Built,
}

/// Closest surface hit returned by a scene query
#[derive(Clone, Debug, PartialEq)]
pub struct Intersection {
    pub t: f32,
    pub primitive: usize,
    pub face: usize,
    pub geom: PointGeometry,
    pub material: Option<Locator>,
}

/// Scene graph: primitives plus a spatial index over them
pub trait Scene: Send + Sync {
    fn add_primitive(&self, spec: PrimitiveSpec) -> Result<()>;

    /// Use the accelerator at `accel` for subsequent builds
    fn attach_accel(&self, accel: Locator);

    fn build(&self, store: &InstanceStore) -> Result<()>;

    /// State as of the last mutation, build or check
    fn state(&self) -> SceneState;

    /// Drop back to `Populated` if anything the index was built from has
    /// been rebuilt, replaced or removed since, then report the state
    fn refresh(&self, store: &InstanceStore) -> SceneState;

    fn primitive_count(&self) -> usize;

    /// Ok when the scene is built, still current and has a camera
    fn renderable(&self, store: &InstanceStore) -> Result<()>;

    /// Closest intersection along `ray`; requires a built, current scene
    fn query(&self, store: &InstanceStore, ray: &Ray) -> Result<Option<Intersection>>;

    /// Primary ray of the scene camera
    fn primary_ray(&self, store: &InstanceStore, rp: Vec2, aspect_ratio: f32) -> Result<Ray>;

    /// Material component at an intersection, if any
    fn material_of(&self, store: &InstanceStore, hit: &Intersection) -> Option<ComponentRef> {
        let locator = hit.material.as_ref()?;
        store
            .resolve(locator)
            .filter(|component| component.implements(CapabilityKind::Material))
    }
}
