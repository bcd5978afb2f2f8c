//! Short-time Fourier transform front-end
//!
//! Frames the signal, applies a Hann window, zero-pads each frame to the
//! next power of two, and runs a forward FFT in `f64` complex arithmetic.
//! The output is a magnitude spectrogram: one row per frame, `N/2 + 1` bins.

use rustfft::{num_complex::Complex, FftPlanner};
use tracing::debug;
use voice_biometric_common::{AudioBuffer, StftConfig};

/// Magnitude spectrogram produced by [`apply_stft`].
///
/// Invariant: every frame has the same number of bins (`fft_size / 2 + 1`).
#[derive(Debug, Clone)]
pub struct Spectrogram {
    frames: Vec<Vec<f64>>,
    fft_size: usize,
    sample_rate: u32,
}

impl Spectrogram {
    #[must_use]
    pub fn frames(&self) -> &[Vec<f64>] {
        &self.frames
    }

    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Bins per frame (`fft_size / 2 + 1`).
    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Next power of two at or above `n`.
#[must_use]
pub fn next_power_of_two(n: usize) -> usize {
    n.next_power_of_two()
}

/// Hann window of the given length.
#[must_use]
pub fn hann_window(len: usize) -> Vec<f64> {
    if len <= 1 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (len - 1) as f64).cos())
        })
        .collect()
}

/// Compute the magnitude spectrogram of the buffer.
///
/// Frame length and stride come from the config in milliseconds; the FFT
/// size is the next power of two at or above the frame length. Audio
/// shorter than one frame yields an empty spectrogram.
#[must_use]
pub fn apply_stft(audio: &AudioBuffer, config: &StftConfig) -> Spectrogram {
    let sr = audio.sample_rate() as usize;
    let frame_size = (sr * config.frame_size_ms as usize / 1000).max(1);
    let stride = (sr * config.frame_stride_ms as usize / 1000).max(1);
    let fft_size = next_power_of_two(frame_size);
    let num_bins = fft_size / 2 + 1;

    let samples = audio.samples();
    if samples.len() < frame_size {
        return Spectrogram {
            frames: Vec::new(),
            fft_size,
            sample_rate: audio.sample_rate(),
        };
    }

    let num_frames = 1 + (samples.len() - frame_size) / stride;
    let window = hann_window(frame_size);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(fft_size);

    let mut frames = Vec::with_capacity(num_frames);
    let mut buffer = vec![Complex::new(0.0, 0.0); fft_size];

    for frame_idx in 0..num_frames {
        let start = frame_idx * stride;

        for (i, (&sample, &w)) in samples[start..start + frame_size]
            .iter()
            .zip(window.iter())
            .enumerate()
        {
            buffer[i] = Complex::new(sample * w, 0.0);
        }
        for c in buffer.iter_mut().skip(frame_size) {
            *c = Complex::new(0.0, 0.0);
        }

        fft.process(&mut buffer);

        let magnitudes: Vec<f64> = buffer.iter().take(num_bins).map(|c| c.norm()).collect();
        frames.push(magnitudes);
    }

    debug!(
        num_frames,
        frame_size, stride, fft_size, "computed magnitude spectrogram"
    );

    Spectrogram {
        frames,
        fft_size,
        sample_rate: audio.sample_rate(),
    }
}
