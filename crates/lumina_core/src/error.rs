//! Error types for the component substrate

use std::path::PathBuf;
use thiserror::Error;

use crate::component::CapabilityKind;
use crate::key::ImplementationKey;
use crate::locator::Locator;

/// Result type for component operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while registering, creating, storing or using components
#[derive(Debug, Error)]
pub enum Error {
    /// No factory is registered under the requested key
    #[error("No implementation registered for '{0}'")]
    UnknownKey(ImplementationKey),

    /// A factory is already registered under the key
    #[error("Implementation '{0}' is already registered")]
    DuplicateKey(ImplementationKey),

    /// Malformed implementation key
    #[error("Invalid implementation key '{key}': {reason}")]
    InvalidKey {
        key: String,
        reason: String,
    },

    /// A configuration field is missing or has the wrong type
    #[error("Invalid configuration field '{field}': {reason}")]
    Validation {
        field: String,
        reason: String,
    },

    /// The component rejected its configuration
    #[error("Failed to construct '{key}': {source}")]
    Construction {
        key: ImplementationKey,
        #[source]
        source: Box<Error>,
    },

    /// Locator is already occupied by a live instance
    #[error("Locator '{0}' is already in use")]
    NameCollision(Locator),

    /// A locator segment or asset name is malformed
    #[error("Invalid name '{name}': {reason}")]
    InvalidName {
        name: String,
        reason: String,
    },

    /// The parent locator of an insert does not resolve
    #[error("Parent locator '{0}' does not exist")]
    MissingParent(Locator),

    /// No live instance at the locator
    #[error("No component at '{0}'")]
    NotFound(Locator),

    /// The component does not implement the requested capability
    #[error("Component at '{locator}' does not provide the {capability} capability")]
    MissingCapability {
        locator: Locator,
        capability: CapabilityKind,
    },

    /// Dynamic module could not be loaded or registered
    #[error("Failed to load plugin '{path}': {reason}")]
    PluginLoad {
        path: PathBuf,
        reason: String,
    },

    /// Scene graph could not build its spatial index
    #[error("Scene build failed: {0}")]
    Build(String),

    /// Query issued against a scene graph that is not built
    #[error("Scene is not built; call build() after modifying primitives")]
    NotBuilt,

    /// A render-time query failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Session or runtime configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a plugin load error
    pub fn plugin_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::PluginLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid name error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a component's own failure with the key it was created from
    pub fn construction(key: ImplementationKey, source: Error) -> Self {
        Error::Construction {
            key,
            source: Box::new(source),
        }
    }

    /// Innermost error of a construction chain
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Construction { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_nested_construction() {
        let key = ImplementationKey::new("model", "wavefrontobj").unwrap();
        let inner = Error::construction(
            ImplementationKey::new("mesh", "raw").unwrap(),
            Error::validation("ps", "missing"),
        );
        let err = Error::construction(key, inner);

        assert!(matches!(err.root_cause(), Error::Validation { field, .. } if field == "ps"));
        assert!(err.to_string().contains("model::wavefrontobj"));
    }
}
