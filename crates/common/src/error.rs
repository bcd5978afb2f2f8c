//! Error taxonomy for the engine
//!
//! Every failure surfaces as one of these kinds with structured context.
//! Claim rejections during authentication are NOT errors; they come back as
//! a verdict with `granted == false`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed input: {0}")]
    InputMalformed(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("no usable voice detected: {0}")]
    NoVoiceDetected(String),

    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("model corrupt: {0}")]
    ModelCorrupt(String),

    #[error("degenerate classifier for class {class_id}: {reason}")]
    TrainingDegenerate { class_id: i32, reason: String },

    #[error("operation cancelled after {elapsed_ms} ms")]
    Cancelled { elapsed_ms: u64 },

    #[error("{service} unavailable: {reason}")]
    ExternalUnavailable { service: String, reason: String },

    #[error("identity not registered: {0}")]
    IdentityRejected(String),

    #[error("user {0} already has a voice credential")]
    DuplicateCredential(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Stable machine-readable code for callers that map errors across a
    /// process boundary.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputMalformed(_) => "input_malformed",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::NoVoiceDetected(_) => "no_voice_detected",
            Self::ModelNotLoaded(_) => "model_not_loaded",
            Self::ModelCorrupt(_) => "model_corrupt",
            Self::TrainingDegenerate { .. } => "training_degenerate",
            Self::Cancelled { .. } => "cancelled",
            Self::ExternalUnavailable { .. } => "external_unavailable",
            Self::IdentityRejected(_) => "identity_rejected",
            Self::DuplicateCredential(_) => "duplicate_credential",
            Self::Io(_) => "io",
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = EngineError::DimensionMismatch {
            expected: 250,
            actual: 500,
        };
        assert_eq!(err.code(), "dimension_mismatch");
        assert_eq!(
            EngineError::IdentityRejected("77".into()).code(),
            "identity_rejected"
        );
    }

    #[test]
    fn test_display_carries_context() {
        let err = EngineError::ExternalUnavailable {
            service: "transcriber".to_string(),
            reason: "timeout after 15s".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("transcriber"));
        assert!(msg.contains("timeout"));
    }
}
