//! Film to image conversion

use std::path::Path;

use image::{Rgb, RgbImage};
use lumina_core::interfaces::FilmBuffer;

use crate::error::{Result, RuntimeError};

/// Convert a film buffer to 8-bit RGB, flipping so row 0 ends up at the top
pub fn to_image(buffer: &FilmBuffer) -> RgbImage {
    RgbImage::from_fn(buffer.width, buffer.height, |x, y| {
        let color = buffer
            .pixel(x, buffer.height - 1 - y)
            .unwrap_or_default()
            .clamp(glam::Vec3::ZERO, glam::Vec3::ONE);
        Rgb([
            (color.x * 255.0).round() as u8,
            (color.y * 255.0).round() as u8,
            (color.z * 255.0).round() as u8,
        ])
    })
}

pub fn write_png(buffer: &FilmBuffer, path: &Path) -> Result<()> {
    to_image(buffer)
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|source| RuntimeError::Image {
            path: path.to_path_buf(),
            source,
        })?;
    log::info!("Wrote {}x{} image to {}", buffer.width, buffer.height, path.display());
    Ok(())
}
