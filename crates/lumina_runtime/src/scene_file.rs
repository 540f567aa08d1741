//! Scene description files
//!
//! ```json
//! {
//!   "plugins": ["target/debug/libmaterial_visualize_normal"],
//!   "assets": [
//!     { "name": "film", "key": "film::bitmap", "config": { "w": 320, "h": 240 } },
//!     { "name": "camera", "key": "camera::pinhole", "config": { ... } }
//!   ],
//!   "scene": "scene",
//!   "primitives": [{ "camera": "camera" }, { "model": "bunny" }],
//!   "renderer": "renderer",
//!   "film": "film",
//!   "output": "bunny.png"
//! }
//! ```
//!
//! References in `primitives` are asset names or full locators. Relative
//! plugin and output paths are resolved against the file's directory.

use std::path::{Path, PathBuf};

use lumina::AssetDescription;
use serde::Deserialize;

use crate::error::{Result, RuntimeError};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PrimitiveDescription {
    pub camera: Option<String>,
    pub model: Option<String>,
    pub mesh: Option<String>,
    pub material: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneDescription {
    #[serde(default)]
    pub plugins: Vec<PathBuf>,
    #[serde(default)]
    pub assets: Vec<AssetDescription>,
    /// Asset name of the scene graph
    pub scene: String,
    #[serde(default)]
    pub primitives: Vec<PrimitiveDescription>,
    pub renderer: String,
    pub film: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl SceneDescription {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| RuntimeError::SceneFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut description: Self =
            serde_json::from_str(&text).map_err(|source| RuntimeError::SceneParse {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(base) = path.parent() {
            description.resolve_paths(base);
        }
        log::info!(
            "Loaded scene description {} ({} assets)",
            path.display(),
            description.assets.len()
        );
        Ok(description)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for plugin in &mut self.plugins {
            if plugin.is_relative() {
                *plugin = base.join(&*plugin);
            }
        }
        if let Some(output) = self.output.as_mut().filter(|o| o.is_relative()) {
            *output = base.join(&*output);
        }
    }
}
