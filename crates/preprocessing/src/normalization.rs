//! Level normalisation
//!
//! RMS normalisation compensates for recording gain differences while
//! keeping relative dynamics. Peak normalisation is kept for export paths.

use voice_biometric_common::AudioBuffer;

const SILENCE_EPSILON: f64 = 1e-10;

/// Root-mean-square level of the buffer.
#[must_use]
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f64).sqrt()
}

/// Highest absolute sample value.
#[must_use]
pub fn find_peak(samples: &[f64]) -> f64 {
    samples.iter().fold(0.0, |max, s| s.abs().max(max))
}

/// Scale the buffer to a target RMS level.
///
/// Silence (RMS below epsilon) is returned unchanged rather than amplified
/// into noise.
#[must_use]
pub fn normalize_rms(audio: &AudioBuffer, target_rms: f64) -> AudioBuffer {
    let current = rms(audio.samples());
    if current <= SILENCE_EPSILON {
        return audio.clone();
    }

    let scale = target_rms / current;
    let scaled: Vec<f64> = audio.samples().iter().map(|s| s * scale).collect();
    AudioBuffer::from_validated(scaled, audio.sample_rate())
}

/// Scale the buffer so the highest peak sits at `target_peak`.
#[must_use]
pub fn normalize_peak(audio: &AudioBuffer, target_peak: f64) -> AudioBuffer {
    let peak = find_peak(audio.samples());
    if peak <= SILENCE_EPSILON {
        return audio.clone();
    }

    let scale = target_peak / peak;
    let scaled: Vec<f64> = audio.samples().iter().map(|s| s * scale).collect();
    AudioBuffer::from_validated(scaled, audio.sample_rate())
}
