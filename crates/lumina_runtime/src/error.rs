//! Runtime errors

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{0}")]
    Usage(String),

    #[error("Cannot read scene file {path}: {source}")]
    SceneFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed scene file {path}: {source}")]
    SceneParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Scene description: {0}")]
    Description(String),

    #[error(transparent)]
    Lumina(#[from] lumina::Error),

    #[error("Cannot write image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl RuntimeError {
    pub fn usage(message: impl Into<String>) -> Self {
        RuntimeError::Usage(message.into())
    }

    pub fn description(message: impl Into<String>) -> Self {
        RuntimeError::Description(message.into())
    }
}
