//! Structured model-load failures

use std::path::PathBuf;
use thiserror::Error;
use voice_biometric_common::EngineError;

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("manifest missing at {0}")]
    ManifestMissing(PathBuf),

    #[error("manifest invalid: {0}")]
    ManifestInvalid(String),

    #[error("classifier file missing for class {0}")]
    ClassifierMissing(i32),

    #[error("classifier {class_id} invalid: {reason}")]
    ClassifierInvalid { class_id: i32, reason: String },

    #[error("classifier {class_id} has dimension {actual}, manifest says {expected}")]
    DimensionMismatch {
        class_id: i32,
        expected: usize,
        actual: usize,
    },

    #[error("classifier file {0} on disk but not in manifest")]
    StrayClassifier(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ModelLoadError> for EngineError {
    fn from(err: ModelLoadError) -> Self {
        match err {
            ModelLoadError::ManifestMissing(path) => {
                EngineError::ModelNotLoaded(format!("no manifest at {}", path.display()))
            }
            other => EngineError::ModelCorrupt(other.to_string()),
        }
    }
}
