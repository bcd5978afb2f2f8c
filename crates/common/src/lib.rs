//! Common types and configuration for the voice biometric engine

pub mod audio;
pub mod config;
pub mod deadline;
pub mod error;

pub use audio::AudioBuffer;
pub use config::{
    AugmentationConfig, AuthConfig, ClassWeighting, DatasetConfig, EngineConfig, MetricFloors,
    MfccConfig, PreprocessingConfig, StftConfig, SvmConfig, VadConfig,
};
pub use deadline::Deadline;
pub use error::{EngineError, Result};
