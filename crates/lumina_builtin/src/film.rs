//! In-memory RGB film (`film::bitmap`)

use glam::Vec3;
use parking_lot::RwLock;
use serde_json::json;

use lumina_core::interfaces::{Film, FilmBuffer, FilmSize};
use lumina_core::{Component, ConfigExt, ConfigValue, ConstructContext, Error, Result};

/// Film of `w` x `h` pixels; pixel writes are thread safe
#[derive(Debug)]
pub struct Bitmap {
    size: FilmSize,
    data: RwLock<Vec<Vec3>>,
}

impl Default for Bitmap {
    fn default() -> Self {
        Self {
            size: FilmSize { w: 1, h: 1 },
            data: RwLock::new(vec![Vec3::ZERO]),
        }
    }
}

impl Bitmap {
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.size.w && y < self.size.h)
            .then(|| y as usize * self.size.w as usize + x as usize)
    }
}

impl Component for Bitmap {
    fn construct(&mut self, config: &ConfigValue, _ctx: &mut ConstructContext<'_>) -> Result<()> {
        let w: u32 = config.required("w")?;
        let h: u32 = config.required("h")?;
        if w == 0 {
            return Err(Error::validation("w", "must be positive"));
        }
        if h == 0 {
            return Err(Error::validation("h", "must be positive"));
        }
        self.size = FilmSize { w, h };
        *self.data.get_mut() = vec![Vec3::ZERO; w as usize * h as usize];
        Ok(())
    }

    fn serialize(&self) -> Option<ConfigValue> {
        Some(json!({ "w": self.size.w, "h": self.size.h }))
    }

    fn as_film(&self) -> Option<&(dyn Film + 'static)> {
        Some(self)
    }
}

impl Film for Bitmap {
    fn size(&self) -> FilmSize {
        self.size
    }

    fn set_pixel(&self, x: u32, y: u32, color: Vec3) {
        if let Some(i) = self.index(x, y) {
            self.data.write()[i] = color;
        }
    }

    fn set_row(&self, y: u32, colors: &[Vec3]) {
        let Some(start) = self.index(0, y) else {
            return;
        };
        let n = colors.len().min(self.size.w as usize);
        self.data.write()[start..start + n].copy_from_slice(&colors[..n]);
    }

    fn clear(&self) {
        self.data.write().fill(Vec3::ZERO);
    }

    fn buffer(&self) -> FilmBuffer {
        let data = self.data.read();
        FilmBuffer {
            width: self.size.w,
            height: self.size.h,
            data: data.iter().flat_map(|c| c.to_array()).collect(),
        }
    }
}
