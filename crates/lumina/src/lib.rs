//! # lumina - asset loader facade
//!
//! A [`Session`] bundles a registry, an instance store and a plugin loader.
//! Assets are created by key and configuration and addressed by name:
//!
//! ```no_run
//! use lumina::Session;
//! use serde_json::json;
//!
//! # fn main() -> lumina::Result<()> {
//! let session = Session::new()?;
//! let film = session.load_film("film", "bitmap", &json!({ "w": 64, "h": 48 }))?;
//! let camera = session.load_camera("camera", "pinhole", &json!({
//!     "position": [0, 0, 5], "center": [0, 0, 0], "up": [0, 1, 0], "vfov": 30
//! }))?;
//! let accel = session.load_accel("accel", "bvh", &json!({}))?;
//! let scene = session.load_scene("scene", "default", &json!({}))?;
//! scene.attach_accel(&accel)?;
//! scene.add_camera(&camera)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod handle;
pub mod logging;
pub mod session;
pub mod state;

pub use config::SessionConfig;
pub use handle::{
    AccelHandle, AssetHandle, CameraHandle, FilmHandle, MaterialHandle, MeshHandle, ModelHandle,
    RendererHandle, SceneHandle,
};
pub use session::{Session, ASSETS};
pub use state::{AssetDescription, SavedState};

pub use lumina_core::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::handle::*;
    pub use crate::session::Session;
    pub use crate::state::{AssetDescription, SavedState};
    pub use lumina_core::prelude::*;
}
