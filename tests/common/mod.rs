//! Shared fixtures for the integration suites
#![allow(dead_code)] // not every suite uses every fixture

use voice_biometric_common::{AudioBuffer, EngineConfig, SvmConfig};

pub const SR: u32 = 16000;

/// Engine config with a shortened training schedule for test runtimes.
/// The protocol (Adam, weighting, floors, collapse handling) is unchanged.
#[must_use]
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.svm = SvmConfig {
        epochs_max: 1200,
        min_epochs: 80,
        patience: 150,
        patience_minority: 150,
        ..SvmConfig::default()
    };
    config
}

/// Synthetic speaker: harmonic stack on a per-speaker fundamental, two
/// seconds at 16 kHz.
#[must_use]
pub fn speaker_recording(fundamental: f64, phase: f64) -> AudioBuffer {
    let samples: Vec<f64> = (0..2 * SR as usize)
        .map(|i| {
            let t = i as f64 / f64::from(SR);
            0.3 * f64::sin(2.0 * std::f64::consts::PI * fundamental * t + phase)
                + 0.12 * f64::sin(2.0 * std::f64::consts::PI * 2.0 * fundamental * t)
                + 0.05 * f64::sin(2.0 * std::f64::consts::PI * 3.0 * fundamental * t + phase)
        })
        .collect();
    AudioBuffer::new(samples, SR).unwrap()
}

/// A -60 dB RMS pure tone, the VAD fail-open fixture.
#[must_use]
pub fn quiet_tone() -> AudioBuffer {
    let samples: Vec<f64> = (0..2 * SR as usize)
        .map(|i| 0.001 * f64::sin(2.0 * std::f64::consts::PI * 440.0 * i as f64 / f64::from(SR)))
        .collect();
    AudioBuffer::new(samples, SR).unwrap()
}
