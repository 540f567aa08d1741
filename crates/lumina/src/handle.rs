//! Typed handles to assets
//!
//! A handle is a [`Locator`] plus the capability its asset was created for.
//! It does not keep the asset alive: if the asset is removed, calls through
//! the handle fail with [`Error::NotFound`], and if it is replaced they reach
//! the replacement.

use std::fmt;
use std::marker::PhantomData;

use glam::{Vec2, Vec3};
use lumina_core::geometry::{PointGeometry, Ray};
use lumina_core::interfaces::{
    Accel, Camera, Film, FilmBuffer, FilmSize, Intersection, Material, Mesh, Model, PrimitiveSpec,
    Renderer, Scene, SceneState,
};
use lumina_core::{Capability, ComponentRef, Error, InstanceStore, Locator, Result};

pub type MaterialHandle<'s> = AssetHandle<'s, dyn Material>;
pub type MeshHandle<'s> = AssetHandle<'s, dyn Mesh>;
pub type ModelHandle<'s> = AssetHandle<'s, dyn Model>;
pub type CameraHandle<'s> = AssetHandle<'s, dyn Camera>;
pub type AccelHandle<'s> = AssetHandle<'s, dyn Accel>;
pub type FilmHandle<'s> = AssetHandle<'s, dyn Film>;
pub type RendererHandle<'s> = AssetHandle<'s, dyn Renderer>;
pub type SceneHandle<'s> = AssetHandle<'s, dyn Scene>;

/// Locator of an asset expected to provide capability `C`
pub struct AssetHandle<'s, C: ?Sized> {
    store: &'s InstanceStore,
    loc: Locator,
    _capability: PhantomData<fn(&C)>,
}

impl<'s, C: Capability + ?Sized> AssetHandle<'s, C> {
    pub(crate) fn new(store: &'s InstanceStore, loc: Locator) -> Self {
        Self {
            store,
            loc,
            _capability: PhantomData,
        }
    }

    pub fn loc(&self) -> &Locator {
        &self.loc
    }

    pub fn into_locator(self) -> Locator {
        self.loc
    }

    /// Whether the asset is still live
    pub fn is_live(&self) -> bool {
        self.store.contains(&self.loc)
    }

    pub fn component(&self) -> Result<ComponentRef> {
        self.store.resolve_capability(&self.loc, C::KIND)
    }

    /// Run `f` against the asset's capability
    pub fn with<R>(&self, f: impl FnOnce(&C) -> R) -> Result<R> {
        self.store.with_capability::<C, R, _>(&self.loc, f)
    }
}

impl<C: ?Sized> Clone for AssetHandle<'_, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            loc: self.loc.clone(),
            _capability: PhantomData,
        }
    }
}

impl<C: Capability + ?Sized> fmt::Debug for AssetHandle<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("loc", &self.loc)
            .field("capability", &C::KIND)
            .finish()
    }
}

impl AssetHandle<'_, dyn Material> {
    pub fn reflectance(&self, geom: &PointGeometry) -> Result<Option<Vec3>> {
        self.with(|material| material.reflectance(geom))
    }
}

impl AssetHandle<'_, dyn Mesh> {
    pub fn triangle_count(&self) -> Result<usize> {
        self.with(|mesh| mesh.triangle_count())
    }
}

impl AssetHandle<'_, dyn Model> {
    /// Locators of the meshes the model contributes
    pub fn meshes(&self) -> Result<Vec<Locator>> {
        self.with(|model| model.primitives().into_iter().map(|p| p.mesh).collect())
    }
}

impl AssetHandle<'_, dyn Camera> {
    pub fn primary_ray(&self, rp: Vec2, aspect_ratio: f32) -> Result<Ray> {
        self.with(|camera| camera.primary_ray(rp, aspect_ratio))
    }
}

impl AssetHandle<'_, dyn Film> {
    pub fn size(&self) -> Result<FilmSize> {
        self.with(|film| film.size())
    }

    /// Copy of the film contents
    pub fn buffer(&self) -> Result<FilmBuffer> {
        self.with(|film| film.buffer())
    }
}

impl AssetHandle<'_, dyn Renderer> {
    pub fn render(&self) -> Result<()> {
        let store = self.store;
        log::info!("Rendering with {}", self.loc);
        self.with(|renderer| renderer.render(store))?
    }
}

impl AssetHandle<'_, dyn Scene> {
    pub fn add_primitive(&self, spec: PrimitiveSpec) -> Result<()> {
        self.with(|scene| scene.add_primitive(spec))?
    }

    pub fn add_camera(&self, camera: &CameraHandle<'_>) -> Result<()> {
        self.add_primitive(PrimitiveSpec::camera(camera.loc().clone()))
    }

    pub fn add_model(&self, model: &ModelHandle<'_>) -> Result<()> {
        self.add_primitive(PrimitiveSpec::model(model.loc().clone()))
    }

    pub fn add_mesh(&self, mesh: &MeshHandle<'_>, material: Option<&MaterialHandle<'_>>) -> Result<()> {
        self.add_primitive(PrimitiveSpec::mesh(
            mesh.loc().clone(),
            material.map(|m| m.loc().clone()),
        ))
    }

    pub fn attach_accel(&self, accel: &AccelHandle<'_>) -> Result<()> {
        if !accel.is_live() {
            return Err(Error::NotFound(accel.loc().clone()));
        }
        self.with(|scene| scene.attach_accel(accel.loc().clone()))
    }

    pub fn build(&self) -> Result<()> {
        let store = self.store;
        self.with(|scene| scene.build(store))?
    }

    pub fn query(&self, ray: &Ray) -> Result<Option<Intersection>> {
        let store = self.store;
        self.with(|scene| scene.query(store, ray))?
    }

    /// Material component at a hit, if the primitive has one
    pub fn material_of(&self, hit: &Intersection) -> Result<Option<ComponentRef>> {
        let store = self.store;
        self.with(|scene| scene.material_of(store, hit))
    }

    /// Current state; a built scene whose inputs changed reports `Populated`
    pub fn state(&self) -> Result<SceneState> {
        let store = self.store;
        self.with(|scene| scene.refresh(store))
    }

    pub fn primitive_count(&self) -> Result<usize> {
        self.with(|scene| scene.primitive_count())
    }
}
