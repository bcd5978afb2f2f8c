//! Audio buffer type shared across the pipeline

use crate::error::{EngineError, Result};

/// Mono audio samples with their sample rate.
///
/// Samples are `f64` in the nominal range [-1.0, 1.0]. Construction rejects
/// non-finite samples and a zero sample rate so downstream stages can assume
/// a well-formed signal.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f64>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer, validating the invariants.
    ///
    /// # Errors
    /// Returns `InputMalformed` if the sample rate is zero or any sample is
    /// NaN or infinite.
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(EngineError::InputMalformed(
                "sample rate must be positive".to_string(),
            ));
        }
        if let Some(idx) = samples.iter().position(|s| !s.is_finite()) {
            return Err(EngineError::InputMalformed(format!(
                "non-finite sample at index {idx}"
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Build a buffer from samples already known to be finite.
    ///
    /// Used by stages that only transform validated audio (normalisation,
    /// VAD, augmentation) and cannot introduce non-finite values.
    #[must_use]
    pub fn from_validated(samples: Vec<f64>, sample_rate: u32) -> Self {
        debug_assert!(samples.iter().all(|s| s.is_finite()));
        debug_assert!(sample_rate > 0);
        Self {
            samples,
            sample_rate,
        }
    }

    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    #[must_use]
    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_buffer() {
        let buf = AudioBuffer::new(vec![0.0, 0.5, -0.5], 16000).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.sample_rate(), 16000);
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        assert!(AudioBuffer::new(vec![0.0], 0).is_err());
    }

    #[test]
    fn test_rejects_non_finite_samples() {
        assert!(AudioBuffer::new(vec![0.0, f64::NAN], 16000).is_err());
        assert!(AudioBuffer::new(vec![f64::INFINITY], 16000).is_err());
    }

    #[test]
    fn test_duration() {
        let buf = AudioBuffer::new(vec![0.0; 32000], 16000).unwrap();
        assert!((buf.duration_secs() - 2.0).abs() < 1e-12);
    }
}
