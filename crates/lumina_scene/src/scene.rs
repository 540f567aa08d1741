//! Scene graph component (`scene::default`)
//!
//! Holds primitives as weak references (locators) plus the accelerator to
//! index them with. `build` resolves every reference, gathers triangles and
//! hands them to the accelerator; only a built scene answers queries. Any
//! change to primitives or the accelerator drops the scene back to
//! `Populated`, and calling `build` on a built scene rebuilds it.
//!
//! The index lives in the accelerator, which other scenes may share, and is
//! built from meshes and models the scene only references. A build records
//! the accelerator's generation and the identity of every instance it read;
//! if any of them changed by the next query the scene falls back to
//! `Populated` and the query fails with `NotBuilt`.

use glam::Vec2;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};

use lumina_core::geometry::Ray;
use lumina_core::interfaces::{
    Accel, AccelGeometry, Camera, Intersection, Mesh, Model, PrimitiveSpec, Scene, SceneState,
};
use lumina_core::{
    CapabilityKind, Component, ConfigExt, ConfigValue, ConstructContext, Error, InstanceStore,
    Locator, Result,
};

/// Lower bound for query distances, avoids self intersection
pub const RAY_EPSILON: f32 = 1e-4;

/// One entry of the flattened geometry handed to the accelerator
#[derive(Clone, Debug)]
struct Shape {
    mesh: Locator,
    material: Option<Locator>,
}

/// What the current index was built from
struct BuildStamp {
    accel_generation: u64,
    /// Store revision at which `dependencies` last matched
    revision: AtomicU64,
    /// Accelerator, models and meshes with their instance ids
    dependencies: Vec<(Locator, u64)>,
}

struct SceneData {
    primitives: Vec<PrimitiveSpec>,
    accel: Option<Locator>,
    state: SceneState,
    shapes: Vec<Shape>,
    camera: Option<Locator>,
    stamp: Option<BuildStamp>,
}

impl SceneData {
    fn touch(&mut self) {
        self.stamp = None;
        self.state = if self.primitives.is_empty() {
            SceneState::Empty
        } else {
            SceneState::Populated
        };
    }

    /// Whether the index still reflects what `build` read
    fn is_current(&self, store: &InstanceStore) -> bool {
        let (Some(stamp), Some(accel)) = (&self.stamp, &self.accel) else {
            return false;
        };
        let generation = store.with_capability::<dyn Accel, _, _>(accel, |accel| accel.generation());
        if generation.ok() != Some(stamp.accel_generation) {
            return false;
        }

        let revision = store.revision();
        if stamp.revision.load(Ordering::Acquire) == revision {
            return true;
        }
        let unchanged = stamp
            .dependencies
            .iter()
            .all(|(locator, id)| store.instance_id(locator) == Some(*id));
        if unchanged {
            stamp.revision.store(revision, Ordering::Release);
        }
        unchanged
    }
}

pub struct SceneGraph {
    data: RwLock<SceneData>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self {
            data: RwLock::new(SceneData {
                primitives: Vec::new(),
                accel: None,
                state: SceneState::Empty,
                shapes: Vec::new(),
                camera: None,
                stamp: None,
            }),
        }
    }
}

fn validate_primitive(spec: &PrimitiveSpec) -> Result<()> {
    let roles = [spec.camera.is_some(), spec.model.is_some(), spec.mesh.is_some()]
        .into_iter()
        .filter(|set| *set)
        .count();
    match roles {
        0 => Err(Error::validation(
            "primitive",
            "must reference a camera, a model or a mesh",
        )),
        1 if spec.material.is_some() && spec.mesh.is_none() => Err(Error::validation(
            "material",
            "a material can only accompany a mesh",
        )),
        1 => Ok(()),
        _ => Err(Error::validation(
            "primitive",
            "camera, model and mesh are mutually exclusive",
        )),
    }
}

fn build_error(what: impl std::fmt::Display, err: Error) -> Error {
    Error::Build(format!("{}: {}", what, err))
}

fn instance_id(store: &InstanceStore, locator: &Locator) -> Result<u64> {
    store
        .instance_id(locator)
        .ok_or_else(|| Error::Build(format!("{} vanished during build", locator)))
}

/// Triangles of the mesh at `locator`; empty meshes are rejected
fn mesh_triangles(store: &InstanceStore, locator: &Locator) -> Result<Vec<lumina_core::geometry::Triangle>> {
    let triangles = store
        .with_capability::<dyn Mesh, _, _>(locator, |mesh| mesh.triangles())
        .map_err(|e| build_error("invalid mesh reference", e))?;
    if triangles.is_empty() {
        return Err(Error::Build(format!("mesh {} has no triangles", locator)));
    }
    Ok(triangles)
}

/// Everything `build` resolves before handing geometry to the accelerator
struct Gathered {
    shapes: Vec<Shape>,
    geometry: Vec<AccelGeometry>,
    camera: Option<Locator>,
    dependencies: Vec<(Locator, u64)>,
}

impl SceneGraph {
    fn gather(&self, store: &InstanceStore, primitives: &[PrimitiveSpec]) -> Result<Gathered> {
        let mut shapes = Vec::new();
        let mut geometry = Vec::new();
        let mut camera = None;
        let mut dependencies = Vec::new();

        let mut push = |mesh: &Locator,
                        material: Option<Locator>,
                        deps: &mut Vec<(Locator, u64)>|
         -> Result<()> {
            if let Some(material) = &material {
                store
                    .resolve_capability(material, CapabilityKind::Material)
                    .map_err(|e| build_error("invalid material reference", e))?;
            }
            let triangles = mesh_triangles(store, mesh)?;
            deps.push((mesh.clone(), instance_id(store, mesh)?));
            geometry.push(AccelGeometry {
                primitive: shapes.len(),
                triangles,
            });
            shapes.push(Shape {
                mesh: mesh.clone(),
                material,
            });
            Ok(())
        };

        for spec in primitives {
            if let Some(locator) = &spec.camera {
                store
                    .resolve_capability(locator, CapabilityKind::Camera)
                    .map_err(|e| build_error("invalid camera reference", e))?;
                camera = Some(locator.clone());
            } else if let Some(locator) = &spec.model {
                let parts = store
                    .with_capability::<dyn Model, _, _>(locator, |model| model.primitives())
                    .map_err(|e| build_error("invalid model reference", e))?;
                dependencies.push((locator.clone(), instance_id(store, locator)?));
                for part in parts {
                    push(&part.mesh, part.material, &mut dependencies)?;
                }
            } else if let Some(locator) = &spec.mesh {
                push(locator, spec.material.clone(), &mut dependencies)?;
            }
        }
        Ok(Gathered {
            shapes,
            geometry,
            camera,
            dependencies,
        })
    }

    /// Read access to a built scene whose index is still current
    ///
    /// A stale index drops the scene back to `Populated`.
    fn current(&self, store: &InstanceStore) -> Result<RwLockReadGuard<'_, SceneData>> {
        let data = self.data.read();
        if data.state != SceneState::Built {
            return Err(Error::NotBuilt);
        }
        if data.is_current(store) {
            return Ok(data);
        }
        drop(data);

        let mut data = self.data.write();
        if data.state != SceneState::Built {
            return Err(Error::NotBuilt);
        }
        if data.is_current(store) {
            return Ok(RwLockWriteGuard::downgrade(data));
        }
        log::warn!("Scene index is stale, it must be rebuilt");
        data.touch();
        Err(Error::NotBuilt)
    }
}

impl Component for SceneGraph {
    fn construct(&mut self, config: &ConfigValue, _ctx: &mut ConstructContext<'_>) -> Result<()> {
        let accel = config.optional_locator("accel")?;
        let primitives: Vec<PrimitiveSpec> = config.value_or("primitives", Vec::new())?;
        for spec in &primitives {
            validate_primitive(spec)?;
        }

        let data = self.data.get_mut();
        data.accel = accel;
        data.primitives = primitives;
        data.touch();
        Ok(())
    }

    fn serialize(&self) -> Option<ConfigValue> {
        let data = self.data.read();
        let mut config = json!({ "primitives": data.primitives });
        if let Some(accel) = &data.accel {
            config["accel"] = json!(accel);
        }
        Some(config)
    }

    fn as_scene(&self) -> Option<&(dyn Scene + 'static)> {
        Some(self)
    }
}

impl Scene for SceneGraph {
    fn add_primitive(&self, spec: PrimitiveSpec) -> Result<()> {
        validate_primitive(&spec)?;
        let mut data = self.data.write();
        data.primitives.push(spec);
        data.touch();
        Ok(())
    }

    fn attach_accel(&self, accel: Locator) {
        let mut data = self.data.write();
        data.accel = Some(accel);
        data.touch();
    }

    fn build(&self, store: &InstanceStore) -> Result<()> {
        let mut data = self.data.write();
        // A failed build never leaves a stale Built state behind
        data.touch();

        let accel_locator = data
            .accel
            .clone()
            .ok_or_else(|| Error::Build("no accelerator attached".into()))?;
        if data.primitives.is_empty() {
            return Err(Error::Build("scene has no primitives".into()));
        }

        let revision = store.revision();
        let gathered = self.gather(store, &data.primitives)?;
        let triangles: usize = gathered.geometry.iter().map(|g| g.triangles.len()).sum();
        log::info!(
            "Building {} with {} shapes ({} triangles)",
            accel_locator,
            gathered.shapes.len(),
            triangles
        );
        let accel_generation = store
            .with_capability::<dyn Accel, _, _>(&accel_locator, |accel| {
                accel.build(&gathered.geometry).map(|()| accel.generation())
            })
            .map_err(|e| build_error("invalid accelerator reference", e))??;

        let mut dependencies = gathered.dependencies;
        dependencies.push((accel_locator.clone(), instance_id(store, &accel_locator)?));

        data.shapes = gathered.shapes;
        data.camera = gathered.camera;
        data.stamp = Some(BuildStamp {
            accel_generation,
            revision: AtomicU64::new(revision),
            dependencies,
        });
        data.state = SceneState::Built;
        Ok(())
    }

    fn state(&self) -> SceneState {
        self.data.read().state
    }

    fn refresh(&self, store: &InstanceStore) -> SceneState {
        match self.current(store) {
            Ok(data) => data.state,
            Err(_) => self.state(),
        }
    }

    fn primitive_count(&self) -> usize {
        self.data.read().primitives.len()
    }

    fn renderable(&self, store: &InstanceStore) -> Result<()> {
        if self.primitive_count() == 0 {
            return Err(Error::Build("scene has no primitives".into()));
        }
        let data = self.current(store)?;
        if data.camera.is_none() {
            return Err(Error::Build("scene has no camera primitive".into()));
        }
        Ok(())
    }

    fn query(&self, store: &InstanceStore, ray: &Ray) -> Result<Option<Intersection>> {
        let data = self.current(store)?;
        let accel = data.accel.as_ref().ok_or(Error::NotBuilt)?;

        let hit = store
            .with_capability::<dyn Accel, _, _>(accel, |accel| {
                accel.intersect(ray, RAY_EPSILON, f32::INFINITY)
            })
            .map_err(|e| Error::Query(e.to_string()))?;
        let Some(hit) = hit else {
            return Ok(None);
        };

        let shape = data
            .shapes
            .get(hit.primitive)
            .ok_or_else(|| Error::Query(format!("unknown primitive index {}", hit.primitive)))?;
        let geom = store
            .with_capability::<dyn Mesh, _, _>(&shape.mesh, |mesh| mesh.surface_point(hit.face, hit.uv))
            .map_err(|e| Error::Query(e.to_string()))?
            .ok_or_else(|| Error::Query(format!("face {} missing from {}", hit.face, shape.mesh)))?;

        Ok(Some(Intersection {
            t: hit.t,
            primitive: hit.primitive,
            face: hit.face,
            geom,
            material: shape.material.clone(),
        }))
    }

    fn primary_ray(&self, store: &InstanceStore, rp: Vec2, aspect_ratio: f32) -> Result<Ray> {
        let data = self.current(store)?;
        let camera = data
            .camera
            .as_ref()
            .ok_or_else(|| Error::Build("scene has no camera primitive".into()))?;
        store
            .with_capability::<dyn Camera, _, _>(camera, |camera| camera.primary_ray(rp, aspect_ratio))
            .map_err(|e| Error::Query(e.to_string()))
    }
}
