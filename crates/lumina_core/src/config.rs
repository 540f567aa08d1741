//! Component configuration values
//!
//! Configuration is a JSON-like tree. The core enforces no schema; each
//! component variant reads the fields it understands through [`ConfigExt`].

use glam::{Vec2, Vec3};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::locator::Locator;

/// Dynamically typed configuration tree passed to `construct`
pub type ConfigValue = serde_json::Value;

/// An empty configuration mapping (`{}`)
pub fn empty() -> ConfigValue {
    ConfigValue::Object(serde_json::Map::new())
}

/// Encode a vector as `[x, y, z]`
pub fn vec3(v: Vec3) -> ConfigValue {
    serde_json::json!([v.x, v.y, v.z])
}

/// Typed accessors over a configuration mapping
///
/// Missing fields and type mismatches are reported as
/// [`Error::Validation`] naming the offending field.
pub trait ConfigExt {
    /// Raw field lookup
    fn field(&self, name: &str) -> Option<&ConfigValue>;

    /// Deserialize a field that must be present
    fn required<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .field(name)
            .ok_or_else(|| Error::validation(name, "required field is missing"))?;
        decode(name, value)
    }

    /// Deserialize a field that may be absent; a present but mistyped field is an error
    fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.field(name) {
            None | Some(ConfigValue::Null) => Ok(None),
            Some(value) => decode(name, value).map(Some),
        }
    }

    /// Deserialize a field or fall back to a default
    fn value_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.optional(name)?.unwrap_or(default))
    }

    /// Three-component vector written as `[x, y, z]`
    fn required_vec3(&self, name: &str) -> Result<Vec3> {
        self.required::<[f32; 3]>(name).map(Vec3::from)
    }

    fn optional_vec3(&self, name: &str) -> Result<Option<Vec3>> {
        Ok(self.optional::<[f32; 3]>(name)?.map(Vec3::from))
    }

    /// Two-component vector written as `[x, y]`
    fn optional_vec2(&self, name: &str) -> Result<Option<Vec2>> {
        Ok(self.optional::<[f32; 2]>(name)?.map(Vec2::from))
    }

    /// Weak reference to another component, written as a locator string
    fn required_locator(&self, name: &str) -> Result<Locator> {
        let s: String = self.required(name)?;
        Locator::parse(&s).map_err(|e| Error::validation(name, e.to_string()))
    }

    fn optional_locator(&self, name: &str) -> Result<Option<Locator>> {
        match self.optional::<String>(name)? {
            Some(s) => Locator::parse(&s)
                .map(Some)
                .map_err(|e| Error::validation(name, e.to_string())),
            None => Ok(None),
        }
    }
}

impl ConfigExt for ConfigValue {
    fn field(&self, name: &str) -> Option<&ConfigValue> {
        self.as_object().and_then(|map| map.get(name))
    }
}

fn decode<T: DeserializeOwned>(name: &str, value: &ConfigValue) -> Result<T> {
    T::deserialize(value).map_err(|e| Error::validation(name, e.to_string()))
}
