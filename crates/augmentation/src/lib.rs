//! Enrolment-time audio augmentation
//!
//! Produces perturbed copies of a recording so a speaker enrolled from a
//! handful of samples still yields enough training variety. Every variant
//! applies a time-stretch, a gain change, and additive white noise, with
//! parameters drawn from configured ranges by a seeded RNG.

use tracing::debug;
use voice_biometric_common::{AudioBuffer, AugmentationConfig};

/// Seeded audio variant generator.
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    #[must_use]
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// Generate the original followed by `variations` perturbed copies.
    ///
    /// The RNG is re-seeded per call, so the same input and configuration
    /// always produce the same variants.
    #[must_use]
    pub fn generate(&self, audio: &AudioBuffer) -> Vec<AudioBuffer> {
        let mut rng = fastrand::Rng::with_seed(self.config.seed);
        let mut variants = Vec::with_capacity(self.config.variations + 1);
        variants.push(audio.clone());

        for _ in 0..self.config.variations {
            let speed = uniform(&mut rng, self.config.speed_range.0, self.config.speed_range.1);
            let gain = uniform(&mut rng, self.config.gain_range.0, self.config.gain_range.1);
            let noise_amplitude = rng.f64() * self.config.noise_intensity;

            let mut samples = resample_linear(audio.samples(), speed);
            for sample in &mut samples {
                let noise = noise_amplitude * (rng.f64() * 2.0 - 1.0);
                *sample = *sample * gain + noise;
            }

            debug!(speed, gain, noise_amplitude, "generated audio variant");
            variants.push(AudioBuffer::from_validated(samples, audio.sample_rate()));
        }

        variants
    }
}

fn uniform(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// Time-stretch by `speed` using linear interpolation.
///
/// `speed > 1` shortens the signal, `speed < 1` lengthens it; `speed == 1`
/// reproduces the input exactly.
#[must_use]
pub fn resample_linear(samples: &[f64], speed: f64) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }

    let out_len = ((samples.len() as f64 / speed).round() as usize).max(1);
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * speed;
        let idx = (pos.floor() as usize).min(samples.len() - 1);
        let frac = pos - idx as f64;
        let next = samples.get(idx + 1).copied().unwrap_or(samples[idx]);
        output.push(samples[idx] * (1.0 - frac) + next * frac);
    }

    output
}
