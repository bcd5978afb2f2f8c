//! End-to-end feature extraction pipeline
//!
//! One buffer in, one fixed-dimension feature vector out:
//! RMS normalisation, VAD, STFT, MFCC, temporal statistics, optional
//! polynomial expansion, optional L2 normalisation. Enrolment adds a
//! seeded augmentation fan-out, and batches run across a rayon pool.

pub mod wav;

pub use wav::load_wav;

use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, warn};
use voice_biometric_augmentation::Augmenter;
use voice_biometric_common::{AudioBuffer, Deadline, EngineConfig, EngineError, Result};
use voice_biometric_features::{
    expand_polynomial, extract_mfcc, l2_normalize, mfcc_statistics,
};
use voice_biometric_preprocessing::{apply_vad, normalize_rms};
use voice_biometric_spectral::apply_stft;

/// Feature extractor configured once and reused across calls.
pub struct FeaturePipeline {
    config: EngineConfig,
    augmenter: Augmenter,
}

impl FeaturePipeline {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let augmenter = Augmenter::new(config.augmentation.clone());
        Self { config, augmenter }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Dimension every produced vector has.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.config.feature_dimension()
    }

    /// Extract one feature vector from one buffer.
    ///
    /// # Errors
    /// `InputMalformed` on too-short input, `NoVoiceDetected` when VAD
    /// retains less than the minimum usable audio, `DimensionMismatch` if
    /// the statistics stage produces an unexpected length.
    pub fn extract(&self, audio: &AudioBuffer) -> Result<Vec<f64>> {
        let min_samples = self.config.dataset.min_audio_samples;
        if audio.len() < min_samples {
            return Err(EngineError::InputMalformed(format!(
                "audio has {} samples, need at least {min_samples}",
                audio.len()
            )));
        }

        let normalized = normalize_rms(audio, self.config.preprocessing.target_rms);
        let voiced = apply_vad(&normalized, &self.config.preprocessing.vad);
        if voiced.len() < min_samples {
            return Err(EngineError::NoVoiceDetected(format!(
                "{} voiced samples after VAD, need {min_samples}",
                voiced.len()
            )));
        }

        let spectrogram = apply_stft(&voiced, &self.config.stft);
        let mfcc = extract_mfcc(&spectrogram, &self.config.mfcc);
        if mfcc.is_empty() {
            return Err(EngineError::NoVoiceDetected(
                "no frames survived the spectral front-end".to_string(),
            ));
        }

        let mut features = mfcc_statistics(&mfcc);
        let expected = self.config.mfcc.base_dimension();
        if features.len() != expected {
            return Err(EngineError::DimensionMismatch {
                expected,
                actual: features.len(),
            });
        }

        // Expansion must happen before L2 so the squares are normalised too
        if self.config.svm.use_poly_expansion {
            expand_polynomial(&mut features);
        }
        if self.config.svm.use_l2 {
            l2_normalize(&mut features);
        }

        debug!(dimension = features.len(), "extracted feature vector");
        Ok(features)
    }

    /// Extract enrolment vectors: the original plus augmented variants.
    ///
    /// Individual variants that fail (e.g. VAD eats a sped-up copy) are
    /// dropped with a warning as long as at least one vector survives.
    ///
    /// # Errors
    /// Propagates the last failure when every variant fails.
    pub fn extract_augmented(&self, audio: &AudioBuffer) -> Result<Vec<Vec<f64>>> {
        let enabled =
            self.config.dataset.use_augmentation && self.config.augmentation.variations > 0;
        if !enabled {
            return Ok(vec![self.extract(audio)?]);
        }

        let variants = self.augmenter.generate(audio);
        let mut vectors = Vec::with_capacity(variants.len());
        let mut last_error = None;

        for (idx, variant) in variants.iter().enumerate() {
            match self.extract(variant) {
                Ok(features) => vectors.push(features),
                Err(e) => {
                    warn!(variant = idx, error = %e, "dropping failed variant");
                    last_error = Some(e);
                }
            }
        }

        if vectors.is_empty() {
            return Err(last_error.expect("at least one variant was attempted"));
        }
        Ok(vectors)
    }

    /// Extract one vector from a WAV file.
    ///
    /// # Errors
    /// Decoding and extraction failures.
    pub fn extract_file(&self, path: &Path) -> Result<Vec<f64>> {
        self.extract(&load_wav(path)?)
    }

    /// Extract augmented vectors for a batch of buffers on the rayon pool.
    ///
    /// The deadline is checked as each audio is picked up; a cancellation
    /// or per-audio failure fails the whole batch.
    ///
    /// # Errors
    /// First failure encountered, including `Cancelled`.
    pub fn extract_batch(
        &self,
        audios: &[AudioBuffer],
        deadline: &Deadline,
    ) -> Result<Vec<Vec<Vec<f64>>>> {
        audios
            .par_iter()
            .map(|audio| {
                deadline.check()?;
                self.extract_augmented(audio)
            })
            .collect()
    }
}
