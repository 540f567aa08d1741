//! Brute-force accelerator

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use lumina_core::geometry::{Ray, Triangle};
use lumina_core::interfaces::{next_accel_generation, Accel, AccelGeometry, AccelHit};
use lumina_core::{Component, ConfigValue, Result};

/// Tests every triangle for every ray
#[derive(Default)]
pub struct LinearAccel {
    triangles: RwLock<Vec<(usize, usize, Triangle)>>,
    generation: AtomicU64,
}

impl Component for LinearAccel {
    fn serialize(&self) -> Option<ConfigValue> {
        Some(lumina_core::config::empty())
    }

    fn as_accel(&self) -> Option<&(dyn Accel + 'static)> {
        Some(self)
    }
}

impl Accel for LinearAccel {
    fn build(&self, geometry: &[AccelGeometry]) -> Result<()> {
        let triangles: Vec<_> = geometry
            .iter()
            .flat_map(|g| {
                g.triangles
                    .iter()
                    .enumerate()
                    .map(move |(face, tri)| (g.primitive, face, *tri))
            })
            .collect();
        log::debug!("Linear accel over {} triangles", triangles.len());
        *self.triangles.write() = triangles;
        self.generation.store(next_accel_generation(), Ordering::Release);
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn intersect(&self, ray: &Ray, tmin: f32, mut tmax: f32) -> Option<AccelHit> {
        let mut closest = None;
        for (primitive, face, tri) in self.triangles.read().iter() {
            if let Some(hit) = tri.intersect(ray, tmin, tmax) {
                tmax = hit.t;
                closest = Some(AccelHit {
                    t: hit.t,
                    uv: hit.uv,
                    primitive: *primitive,
                    face: *face,
                });
            }
        }
        closest
    }
}
