//! Renderers (`renderer::raycast`, `renderer::blank`)

use glam::{Vec2, Vec3};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

use lumina_core::config;
use lumina_core::interfaces::{Film, Renderer, Scene};
use lumina_core::{
    CapabilityKind, Component, ConfigExt, ConfigValue, ConstructContext, Error, InstanceStore,
    Locator, Result,
};

fn film_of<'a>(component: &'a lumina_core::ComponentRef, locator: &Locator) -> Result<&'a dyn Film> {
    component.as_film().ok_or_else(|| Error::MissingCapability {
        locator: locator.clone(),
        capability: CapabilityKind::Film,
    })
}

fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Shades primary-ray hits with their reflectance or normal
#[derive(Debug, Clone, PartialEq)]
pub struct Raycast {
    scene: Locator,
    output: Locator,
    bg_color: Vec3,
    use_constant_color: bool,
    visualize_normal: bool,
    color: Option<Vec3>,
    /// Worker threads, 0 means one per available core
    threads: usize,
}

impl Default for Raycast {
    fn default() -> Self {
        Self {
            scene: Locator::root(),
            output: Locator::root(),
            bg_color: Vec3::ZERO,
            use_constant_color: false,
            visualize_normal: false,
            color: None,
            threads: 0,
        }
    }
}

impl Raycast {
    fn shade(&self, scene: &dyn Scene, store: &InstanceStore, rp: Vec2, aspect: f32) -> Result<Vec3> {
        let ray = scene.primary_ray(store, rp, aspect)?;
        let Some(hit) = scene.query(store, &ray)? else {
            return Ok(self.bg_color);
        };
        if self.visualize_normal {
            return Ok(hit.geom.n.abs());
        }

        let reflectance = match self.color {
            Some(color) => Some(color),
            None => scene
                .material_of(store, &hit)
                .and_then(|m| m.as_material().and_then(|m| m.reflectance(&hit.geom))),
        };
        let mut c = reflectance.unwrap_or(Vec3::ZERO);
        if !self.use_constant_color {
            c *= 0.2 + 0.8 * hit.geom.n.dot(-ray.direction).abs();
        }
        Ok(c)
    }
}

impl Component for Raycast {
    fn construct(&mut self, config: &ConfigValue, _ctx: &mut ConstructContext<'_>) -> Result<()> {
        *self = Self {
            scene: config.required_locator("scene")?,
            output: config.required_locator("output")?,
            bg_color: config.optional_vec3("bg_color")?.unwrap_or(Vec3::ZERO),
            use_constant_color: config.value_or("use_constant_color", false)?,
            visualize_normal: config.value_or("visualize_normal", false)?,
            color: config.optional_vec3("color")?,
            threads: config.value_or("threads", 0)?,
        };
        Ok(())
    }

    fn serialize(&self) -> Option<ConfigValue> {
        let mut out = json!({
            "scene": self.scene,
            "output": self.output,
            "bg_color": config::vec3(self.bg_color),
            "use_constant_color": self.use_constant_color,
            "visualize_normal": self.visualize_normal,
            "threads": self.threads,
        });
        if let Some(color) = self.color {
            out["color"] = config::vec3(color);
        }
        Some(out)
    }

    fn as_renderer(&self) -> Option<&(dyn Renderer + 'static)> {
        Some(self)
    }
}

impl Renderer for Raycast {
    fn render(&self, store: &InstanceStore) -> Result<()> {
        let scene_ref = store.resolve_capability(&self.scene, CapabilityKind::Scene)?;
        let scene = scene_ref.as_scene().ok_or_else(|| Error::NotFound(self.scene.clone()))?;
        scene.renderable(store)?;

        let film_ref = store.resolve_capability(&self.output, CapabilityKind::Film)?;
        let film = film_of(&film_ref, &self.output)?;
        film.clear();

        let size = film.size();
        let aspect = film.aspect_ratio();
        let threads = match self.threads {
            0 => default_threads(),
            n => n,
        }
        .clamp(1, (size.h as usize).max(1));
        let next_row = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        log::info!(
            "Rendering {} into {} ({}x{}, {} threads)",
            self.scene,
            self.output,
            size.w,
            size.h,
            threads
        );

        crossbeam_utils::thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|_| {
                    let mut row = vec![Vec3::ZERO; size.w as usize];
                    loop {
                        let y = next_row.fetch_add(1, Ordering::Relaxed);
                        if y >= size.h as usize {
                            break;
                        }
                        for (x, pixel) in row.iter_mut().enumerate() {
                            let rp = Vec2::new(
                                (x as f32 + 0.5) / size.w as f32,
                                (y as f32 + 0.5) / size.h as f32,
                            );
                            *pixel = match self.shade(scene, store, rp, aspect) {
                                Ok(color) => color,
                                Err(e) => {
                                    if failed.fetch_add(1, Ordering::Relaxed) == 0 {
                                        log::warn!("Query failed at ({}, {}): {}", x, y, e);
                                    }
                                    self.bg_color
                                }
                            };
                        }
                        film.set_row(y as u32, &row);
                    }
                });
            }
        })
        .map_err(|_| Error::Query("render worker panicked".into()))?;

        let failed = failed.into_inner();
        if failed > 0 {
            log::warn!("{} pixel queries failed", failed);
        }
        log::info!("Finished rendering {}", self.output);
        Ok(())
    }
}

/// Fills the output film with a constant color
#[derive(Debug, Clone, PartialEq)]
pub struct Blank {
    output: Locator,
    color: Vec3,
}

impl Default for Blank {
    fn default() -> Self {
        Self {
            output: Locator::root(),
            color: Vec3::ZERO,
        }
    }
}

impl Component for Blank {
    fn construct(&mut self, config: &ConfigValue, _ctx: &mut ConstructContext<'_>) -> Result<()> {
        self.output = config.required_locator("output")?;
        self.color = config.required_vec3("color")?;
        Ok(())
    }

    fn serialize(&self) -> Option<ConfigValue> {
        Some(json!({ "output": self.output, "color": config::vec3(self.color) }))
    }

    fn as_renderer(&self) -> Option<&(dyn Renderer + 'static)> {
        Some(self)
    }
}

impl Renderer for Blank {
    fn render(&self, store: &InstanceStore) -> Result<()> {
        let film_ref = store.resolve_capability(&self.output, CapabilityKind::Film)?;
        let film = film_of(&film_ref, &self.output)?;
        let size = film.size();
        let row = vec![self.color; size.w as usize];
        for y in 0..size.h {
            film.set_row(y, &row);
        }
        Ok(())
    }
}
