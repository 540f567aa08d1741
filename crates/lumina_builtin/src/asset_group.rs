//! Container for named assets

use lumina_core::{Component, ConfigValue};

/// Parent of user-loaded assets, usually mounted at `$.assets`
///
/// Holds no state of its own; its children live in the instance store and
/// are destroyed with it.
#[derive(Debug, Default)]
pub struct AssetGroup;

impl Component for AssetGroup {
    fn serialize(&self) -> Option<ConfigValue> {
        Some(lumina_core::config::empty())
    }
}
