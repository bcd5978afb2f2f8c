//! WAV decoding at the audio boundary
//!
//! The engine proper works on mono `f64` sample streams; this is the one
//! place container formats are touched. Multi-channel audio is downmixed
//! by averaging the channels.

use hound::{SampleFormat, WavReader};
use std::path::Path;
use tracing::debug;
use voice_biometric_common::{AudioBuffer, EngineError, Result};

/// Load a WAV file as mono `f64` samples in [-1.0, 1.0].
///
/// # Errors
/// Returns `InputMalformed` when the file cannot be parsed as WAV.
pub fn load_wav(path: &Path) -> Result<AudioBuffer> {
    let mut reader = WavReader::open(path)
        .map_err(|e| EngineError::InputMalformed(format!("{}: {e}", path.display())))?;

    let spec = reader.spec();
    let samples: Vec<f64> = match spec.sample_format {
        SampleFormat::Int => {
            let max_value = f64::from(1u32 << (spec.bits_per_sample - 1));
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| f64::from(v) / max_value))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| EngineError::InputMalformed(e.to_string()))?
        }
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| EngineError::InputMalformed(e.to_string()))?,
    };

    let channels = spec.channels as usize;
    let mono = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f64>() / frame.len() as f64)
            .collect()
    } else {
        samples
    };

    debug!(
        path = %path.display(),
        samples = mono.len(),
        sample_rate = spec.sample_rate,
        channels,
        "loaded WAV"
    );

    AudioBuffer::new(mono, spec.sample_rate)
}
