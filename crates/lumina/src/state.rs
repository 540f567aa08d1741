//! Saved session state
//!
//! A snapshot lists every serializable asset under `$.assets` in creation
//! order, so restoring it replays the same `load_asset` calls. Scenes come
//! back populated but not built.

use lumina_core::{ConfigValue, Error, Result};
use serde::{Deserialize, Serialize};

pub const STATE_VERSION: u32 = 1;

/// One asset as passed to [`crate::Session::load_asset`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDescription {
    pub name: String,
    /// `interface::variant`
    pub key: String,
    #[serde(default = "lumina_core::config::empty")]
    pub config: ConfigValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub version: u32,
    pub assets: Vec<AssetDescription>,
}

impl SavedState {
    pub fn new(assets: Vec<AssetDescription>) -> Self {
        Self {
            version: STATE_VERSION,
            assets,
        }
    }

    pub fn to_value(&self) -> Result<ConfigValue> {
        serde_json::to_value(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_value(value: &ConfigValue) -> Result<Self> {
        let state: Self = serde_json::from_value(value.clone())
            .map_err(|e| Error::Config(format!("malformed state: {}", e)))?;
        if state.version != STATE_VERSION {
            return Err(Error::Config(format!(
                "unsupported state version {} (expected {})",
                state.version, STATE_VERSION
            )));
        }
        Ok(state)
    }
}
