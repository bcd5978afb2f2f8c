//! Engine configuration
//!
//! One [`EngineConfig`] value is constructed at startup and threaded through
//! every subsystem constructor. Tests build their own; nothing reads global
//! state.

use serde::{Deserialize, Serialize};

/// Voice activity detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// Absolute floor for the adaptive energy threshold
    pub energy_min: f64,
    /// Analysis frame length in milliseconds
    pub frame_ms: u32,
    /// Stride between analysis frames in milliseconds
    pub stride_ms: u32,
    /// Padding added before and after each voiced run (ms)
    pub padding_ms: u32,
    /// Runs shorter than this are dropped (ms)
    pub min_duration_ms: u32,
    /// Runs separated by at most this gap are merged (ms)
    pub merge_gap_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_min: 0.0005,
            frame_ms: 25,
            stride_ms: 10,
            padding_ms: 150,
            min_duration_ms: 100,
            merge_gap_ms: 250,
        }
    }
}

/// Preprocessing stage parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// RMS level the input is scaled to before VAD
    pub target_rms: f64,
    pub vad: VadConfig,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_rms: 0.1,
            vad: VadConfig::default(),
        }
    }
}

/// Short-time Fourier transform framing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StftConfig {
    pub frame_size_ms: u32,
    pub frame_stride_ms: u32,
}

impl Default for StftConfig {
    fn default() -> Self {
        Self {
            frame_size_ms: 25,
            frame_stride_ms: 10,
        }
    }
}

/// MFCC extraction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfccConfig {
    /// DCT coefficients kept per frame
    pub num_coefficients: usize,
    /// Triangular mel filters
    pub num_filters: usize,
    /// Lower edge of the filterbank (Hz)
    pub f_min: f64,
    /// Upper edge of the filterbank (Hz)
    pub f_max: f64,
}

impl MfccConfig {
    /// Dimension of the statistics vector before polynomial expansion:
    /// five statistics (mean, std, min, max, mean-delta) per coefficient.
    #[must_use]
    pub fn base_dimension(&self) -> usize {
        self.num_coefficients * 5
    }
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            num_coefficients: 50,
            num_filters: 40,
            f_min: 0.0,
            f_max: 8000.0,
        }
    }
}

/// Floors the early-stopping composite score prefers (percent units)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricFloors {
    pub specificity: f64,
    pub recall: f64,
    pub precision: f64,
    pub f1: f64,
}

impl Default for MetricFloors {
    fn default() -> Self {
        Self {
            specificity: 88.0,
            recall: 75.0,
            precision: 75.0,
            f1: 75.0,
        }
    }
}

/// Positive-class weighting for imbalanced one-vs-all folds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassWeighting {
    /// Use `conservative * ln(1 + ratio)` instead of `conservative * ratio`
    pub logarithmic: bool,
    pub conservative_factor: f64,
    pub weight_min: f64,
    pub weight_max: f64,
}

impl Default for ClassWeighting {
    fn default() -> Self {
        Self {
            logarithmic: false,
            conservative_factor: 1.5,
            weight_min: 1.0,
            weight_max: 15.0,
        }
    }
}

/// Per-class binary trainer parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmConfig {
    pub learning_rate: f64,
    pub epochs_max: usize,
    /// Regularisation constant; the penalty term is `‖w‖² / (2C)`
    pub c: f64,
    pub use_l2: bool,
    pub use_poly_expansion: bool,
    pub adam_beta1: f64,
    pub adam_beta2: f64,
    pub adam_epsilon: f64,
    pub batch_size: usize,
    /// Epochs without improvement before stopping
    pub patience: usize,
    /// Patience used when the positive class is minority-heavy
    pub patience_minority: usize,
    /// Positive-sample count below which the minority patience applies
    pub minority_threshold: usize,
    /// Epochs that must run before any early exit
    pub min_epochs: usize,
    pub floors: MetricFloors,
    pub weighting: ClassWeighting,
    /// Recall (percent) at or above which a specificity drop marks collapse
    pub collapse_recall: f64,
    /// Re-initialisation attempts when training comes out degenerate
    pub max_restarts: usize,
    pub seed: u64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.005,
            epochs_max: 40_000,
            c: 10.0,
            use_l2: true,
            use_poly_expansion: false,
            adam_beta1: 0.9,
            adam_beta2: 0.999,
            adam_epsilon: 1e-8,
            batch_size: 32,
            patience: 1500,
            patience_minority: 2000,
            minority_threshold: 50,
            min_epochs: 800,
            floors: MetricFloors::default(),
            weighting: ClassWeighting::default(),
            collapse_recall: 98.0,
            max_restarts: 3,
            seed: 42,
        }
    }
}

/// Authentication gates and confidence calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Minimum top score to consider a claim at all
    pub score_min: f64,
    /// Minimum separation between the top two scores
    pub diff_min: f64,
    /// The runner-up must stay below `runner_up_factor * top`
    pub runner_up_factor: f64,
    /// Top score treated as decisive on its own
    pub score_high: f64,
    /// Minimum normalised phrase similarity
    pub phrase_similarity_min: f64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            score_min: 0.1,
            diff_min: 0.20,
            runner_up_factor: 0.75,
            score_high: 0.8,
            phrase_similarity_min: 0.70,
        }
    }
}

/// Dataset handling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub train_ratio: f64,
    /// Use the fixed per-speaker split instead of the ratio
    pub manual_split: bool,
    pub train_per_speaker: usize,
    pub test_per_speaker: usize,
    pub min_samples_per_speaker: usize,
    /// Shortest audio accepted by the pipeline, in samples
    pub min_audio_samples: usize,
    pub use_augmentation: bool,
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            manual_split: true,
            train_per_speaker: 6,
            test_per_speaker: 1,
            min_samples_per_speaker: 7,
            min_audio_samples: 3048,
            use_augmentation: true,
            seed: 42,
        }
    }
}

/// Enrolment-time augmentation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// Maximum amplitude of the additive white noise
    pub noise_intensity: f64,
    pub gain_range: (f64, f64),
    pub speed_range: (f64, f64),
    /// Perturbed copies generated per input (the original is always kept)
    pub variations: usize,
    pub seed: u64,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            noise_intensity: 0.05,
            gain_range: (0.70, 1.30),
            speed_range: (0.85, 1.15),
            variations: 4,
            seed: 42,
        }
    }
}

/// Top-level configuration threaded through every subsystem
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub preprocessing: PreprocessingConfig,
    pub stft: StftConfig,
    pub mfcc: MfccConfig,
    pub svm: SvmConfig,
    pub auth: AuthConfig,
    pub dataset: DatasetConfig,
    pub augmentation: AugmentationConfig,
}

impl EngineConfig {
    /// Feature-vector dimension the model must carry, accounting for the
    /// optional polynomial expansion.
    #[must_use]
    pub fn feature_dimension(&self) -> usize {
        let base = self.mfcc.base_dimension();
        if self.svm.use_poly_expansion {
            base * 2
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dimension_is_250() {
        let config = EngineConfig::default();
        assert_eq!(config.mfcc.base_dimension(), 250);
        assert_eq!(config.feature_dimension(), 250);
    }

    #[test]
    fn test_poly_expansion_doubles_dimension() {
        let mut config = EngineConfig::default();
        config.svm.use_poly_expansion = true;
        assert_eq!(config.feature_dimension(), 500);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mfcc.num_coefficients, 50);
        assert_eq!(back.svm.patience, 1500);
        assert!((back.auth.runner_up_factor - 0.75).abs() < 1e-12);
    }
}
