//! Audio preprocessing: level normalisation and voice activity detection
//!
//! The pipeline order is fixed: RMS normalisation first, then the adaptive
//! VAD. Both stages are pure functions over [`AudioBuffer`].

pub mod normalization;
pub mod vad;

pub use normalization::{find_peak, normalize_peak, normalize_rms, rms};
pub use vad::apply_vad;
