//! MFCC feature extraction
//!
//! Turns a magnitude spectrogram into the fixed-dimension feature vector the
//! classifier consumes: mel filterbank, log compression, DCT-II, five
//! temporal statistics per coefficient, optional polynomial expansion, and
//! optional L2 normalisation.

pub mod mel;
pub mod stats;

pub use mel::{apply_mel_filterbank, mel_filterbank};
pub use stats::mfcc_statistics;

use tracing::debug;
use voice_biometric_common::MfccConfig;
use voice_biometric_spectral::Spectrogram;

const LOG_EPSILON: f64 = 1e-10;
const NORM_EPSILON: f64 = 1e-10;

/// Extract per-frame MFCC coefficients from a magnitude spectrogram.
///
/// Per frame: mel filterbank energies, `ln(energy + eps)`, DCT-II, first
/// `num_coefficients` kept. Returns a `frames x coefficients` matrix.
#[must_use]
pub fn extract_mfcc(spectrogram: &Spectrogram, config: &MfccConfig) -> Vec<Vec<f64>> {
    if spectrogram.num_frames() == 0 {
        return Vec::new();
    }

    let filterbank = mel_filterbank(
        config.num_filters,
        spectrogram.num_bins(),
        spectrogram.fft_size(),
        spectrogram.sample_rate(),
        config.f_min,
        config.f_max,
    );

    let mut mfcc = Vec::with_capacity(spectrogram.num_frames());
    for frame in spectrogram.frames() {
        let energies = apply_mel_filterbank(frame, &filterbank);
        let log_energies: Vec<f64> = energies.iter().map(|e| (e + LOG_EPSILON).ln()).collect();
        mfcc.push(dct_ii(&log_energies, config.num_coefficients));
    }

    debug!(
        frames = mfcc.len(),
        coefficients = config.num_coefficients,
        "extracted MFCC matrix"
    );

    mfcc
}

/// Type-II discrete cosine transform, keeping the first `count` coefficients.
#[must_use]
pub fn dct_ii(input: &[f64], count: usize) -> Vec<f64> {
    let n = input.len();
    let mut output = Vec::with_capacity(count);
    for k in 0..count {
        let mut sum = 0.0;
        for (m, &value) in input.iter().enumerate() {
            sum += value * (std::f64::consts::PI * k as f64 * (m as f64 + 0.5) / n as f64).cos();
        }
        output.push(sum);
    }
    output
}

/// Append the element-wise square of every feature.
///
/// Lets the linear classifier learn quadratic decision boundaries; doubles
/// the dimension. Must run before L2 normalisation.
pub fn expand_polynomial(features: &mut Vec<f64>) {
    let n = features.len();
    let mut squares = Vec::with_capacity(n);
    for i in 0..n {
        squares.push(features[i] * features[i]);
    }
    features.extend(squares);
}

/// Scale the vector to unit L2 norm.
///
/// Near-zero vectors (norm below epsilon) are left unchanged.
pub fn l2_normalize(features: &mut [f64]) {
    let norm = features.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > NORM_EPSILON {
        for value in features.iter_mut() {
            *value /= norm;
        }
    }
}
