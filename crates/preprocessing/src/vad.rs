//! Adaptive multi-feature voice activity detection
//!
//! No pretrained model: per-frame energy, zero-crossing rate, and spectral
//! entropy are gated against thresholds derived from the same recording.
//! The detector fails open: when nothing usable is found the input comes
//! back unchanged so downstream stages can still run.

use tracing::debug;
use voice_biometric_common::{AudioBuffer, VadConfig};

const ENTROPY_BINS: usize = 8;
const BIN_EPSILON: f64 = 1e-12;

struct FrameFeatures {
    energy: f64,
    zcr: f64,
    entropy: f64,
}

/// Extract the voiced portions of the buffer.
///
/// Frames are scored on RMS energy, zero-crossing rate, and the spectral
/// entropy of eight sub-frame energy bins. Thresholds adapt to the
/// recording; a relaxed fallback gate recovers soft voiced frames. Voiced
/// runs are smoothed, padded, length-filtered, merged, and concatenated in
/// order.
#[must_use]
pub fn apply_vad(audio: &AudioBuffer, config: &VadConfig) -> AudioBuffer {
    let samples = audio.samples();
    let total = samples.len();
    let sr = audio.sample_rate() as usize;

    let frame_size = (sr * config.frame_ms as usize / 1000).max(1);
    let stride = (sr * config.stride_ms as usize / 1000).max(1);
    let padding = sr * config.padding_ms as usize / 1000;
    let min_duration = (sr * config.min_duration_ms as usize / 1000).max(1);
    let merge_gap = sr * config.merge_gap_ms as usize / 1000;

    // Audio shorter than one analysis frame passes through untouched.
    if total < frame_size {
        debug!(total, frame_size, "audio shorter than one VAD frame, passing through");
        return audio.clone();
    }

    let num_frames = 1 + (total - frame_size) / stride;
    let frames = compute_frame_features(samples, num_frames, frame_size, stride);

    let (energy_threshold, zcr_threshold, entropy_threshold) =
        adaptive_thresholds(&frames, config.energy_min);

    debug!(
        num_frames,
        energy_threshold, zcr_threshold, entropy_threshold, "adaptive VAD thresholds"
    );

    let mut is_voice: Vec<bool> = frames
        .iter()
        .map(|f| {
            let energy_gate = f.energy >= energy_threshold;
            let zcr_gate = f.zcr <= zcr_threshold * 1.15;
            let entropy_gate = f.entropy <= entropy_threshold * 1.1;

            let mut voice = energy_gate && (zcr_gate || entropy_gate);
            if !voice && f.energy >= energy_threshold * 0.5 {
                // Relaxed fallback for soft voiced frames
                voice = f.zcr <= zcr_threshold * 0.9 && f.entropy <= entropy_threshold;
            }
            voice
        })
        .collect();

    smooth_gaps(&mut is_voice);

    let segments = extract_segments(
        &is_voice, num_frames, stride, frame_size, padding, min_duration, total,
    );

    if segments.is_empty() {
        debug!("no voiced run survived, returning input unchanged");
        return audio.clone();
    }

    let merged = merge_segments(segments, merge_gap);

    let kept: usize = merged.iter().map(|(s, e)| e - s).sum();
    let mut result = Vec::with_capacity(kept);
    for (start, end) in &merged {
        result.extend_from_slice(&samples[*start..*end]);
    }

    debug!(
        retention = 100.0 * kept as f64 / total as f64,
        segments = merged.len(),
        "VAD complete"
    );

    AudioBuffer::from_validated(result, audio.sample_rate())
}

fn compute_frame_features(
    samples: &[f64],
    num_frames: usize,
    frame_size: usize,
    stride: usize,
) -> Vec<FrameFeatures> {
    let samples_per_bin = (frame_size / ENTROPY_BINS).max(1);
    let mut frames = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * stride;
        let frame = &samples[start..start + frame_size];

        let mut bin_energy = [0.0_f64; ENTROPY_BINS];
        let mut energy_sum = 0.0;
        let mut zero_crossings = 0usize;

        for (j, &sample) in frame.iter().enumerate() {
            energy_sum += sample * sample;
            if j > 0 {
                let prev = frame[j - 1];
                if (sample >= 0.0 && prev < 0.0) || (sample < 0.0 && prev >= 0.0) {
                    zero_crossings += 1;
                }
            }
            let bin_idx = (j / samples_per_bin).min(ENTROPY_BINS - 1);
            bin_energy[bin_idx] += sample * sample;
        }

        let energy = (energy_sum / frame_size as f64).sqrt();
        let zcr = if frame_size > 1 {
            zero_crossings as f64 / (frame_size - 1) as f64
        } else {
            0.0
        };

        let total_bin_energy: f64 = bin_energy.iter().sum::<f64>().max(BIN_EPSILON);
        let mut entropy = 0.0;
        for value in bin_energy {
            if value <= 0.0 {
                continue;
            }
            let p = value / total_bin_energy;
            entropy -= p * p.log2();
        }
        entropy /= (ENTROPY_BINS as f64).log2();

        frames.push(FrameFeatures { energy, zcr, entropy });
    }

    frames
}

/// Thresholds derived from the recording itself
fn adaptive_thresholds(frames: &[FrameFeatures], energy_min: f64) -> (f64, f64, f64) {
    let n = frames.len() as f64;
    let mean_energy = frames.iter().map(|f| f.energy).sum::<f64>() / n;
    let mean_zcr = frames.iter().map(|f| f.zcr).sum::<f64>() / n;
    let mean_entropy = frames.iter().map(|f| f.entropy).sum::<f64>() / n;

    let mut sorted_energy: Vec<f64> = frames.iter().map(|f| f.energy).collect();
    sorted_energy.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_energy = if sorted_energy.len() % 2 == 0 {
        0.5 * (sorted_energy[sorted_energy.len() / 2] + sorted_energy[sorted_energy.len() / 2 - 1])
    } else {
        sorted_energy[sorted_energy.len() / 2]
    };

    let energy_threshold = energy_min.max(median_energy * 0.75).max(mean_energy * 0.6);
    let zcr_threshold = 0.02_f64.max(mean_zcr * 0.9);
    let entropy_threshold = 0.05_f64.max(mean_entropy * 0.95);

    (energy_threshold, zcr_threshold, entropy_threshold)
}

/// Fill single-frame gaps first, then two-frame gaps between voiced frames.
fn smooth_gaps(is_voice: &mut [bool]) {
    let n = is_voice.len();

    let before: Vec<bool> = is_voice.to_vec();
    for i in 1..n.saturating_sub(1) {
        if !before[i] && before[i - 1] && before[i + 1] {
            is_voice[i] = true;
        }
    }

    for i in 2..n.saturating_sub(2) {
        if !is_voice[i] && !is_voice[i - 1] && is_voice[i - 2] && is_voice[i + 1] {
            is_voice[i] = true;
            is_voice[i - 1] = true;
        }
    }
}

fn extract_segments(
    is_voice: &[bool],
    num_frames: usize,
    stride: usize,
    frame_size: usize,
    padding: usize,
    min_duration: usize,
    total: usize,
) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut i = 0;

    while i < num_frames {
        if !is_voice[i] {
            i += 1;
            continue;
        }

        let start_frame = i;
        while i < num_frames && is_voice[i] {
            i += 1;
        }
        let end_frame = i;

        let start = (start_frame * stride).saturating_sub(padding);
        let end = (end_frame * stride + frame_size + padding).min(total);

        if end - start >= min_duration {
            segments.push((start, end));
        }
    }

    segments
}

fn merge_segments(segments: Vec<(usize, usize)>, merge_gap: usize) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(segments.len());
    for (start, end) in segments {
        match merged.last_mut() {
            Some((_, last_end)) if start.saturating_sub(*last_end) <= merge_gap => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 16000;

    fn buffer(samples: Vec<f64>) -> AudioBuffer {
        AudioBuffer::new(samples, SR).unwrap()
    }

    /// Voice-like burst: low-frequency tone with an amplitude well above the
    /// noise floor, concentrated spectral energy (low entropy), few zero
    /// crossings.
    fn voiced(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 0.3 * f64::sin(2.0 * std::f64::consts::PI * 150.0 * i as f64 / SR as f64))
            .collect()
    }

    /// Noise-like region: tiny amplitude, many sign changes.
    fn noise(len: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let r = (state >> 33) as f64 / (1u64 << 31) as f64 - 1.0;
                0.001 * r
            })
            .collect()
    }

    #[test]
    fn test_short_audio_passes_through() {
        let audio = buffer(vec![0.1; 100]);
        let out = apply_vad(&audio, &VadConfig::default());
        assert_eq!(out.samples(), audio.samples());
    }

    #[test]
    fn test_keeps_voiced_region_drops_silence() {
        let mut samples = noise(SR as usize, 7);
        samples.extend(voiced(SR as usize));
        samples.extend(noise(SR as usize, 13));
        let audio = buffer(samples);

        let out = apply_vad(&audio, &VadConfig::default());
        // The voiced second plus padding should survive; most of the two
        // noise seconds should not.
        assert!(out.len() >= SR as usize);
        assert!(out.len() < audio.len());
    }

    #[test]
    fn test_fail_open_on_uniform_quiet_tone() {
        // A constant quiet tone gives every frame the same features, so
        // either every frame gates as voice (one run covering everything)
        // or none does (fail-open). Both paths must return all samples.
        let samples: Vec<f64> = (0..2 * SR as usize)
            .map(|i| 0.001 * f64::sin(2.0 * std::f64::consts::PI * 440.0 * i as f64 / SR as f64))
            .collect();
        let audio = buffer(samples);
        let out = apply_vad(&audio, &VadConfig::default());
        assert_eq!(out.len(), audio.len());
    }

    #[test]
    fn test_smoothing_fills_single_frame_gap() {
        let mut flags = vec![true, false, true, true];
        smooth_gaps(&mut flags);
        assert_eq!(flags, vec![true, true, true, true]);
    }

    #[test]
    fn test_smoothing_fills_two_frame_gap() {
        let mut flags = vec![true, true, false, false, true, true];
        smooth_gaps(&mut flags);
        assert_eq!(flags, vec![true, true, true, true, true, true]);
    }

    #[test]
    fn test_merge_segments_respects_gap() {
        let merged = merge_segments(vec![(0, 100), (150, 300), (1000, 1100)], 100);
        assert_eq!(merged, vec![(0, 300), (1000, 1100)]);
    }

    #[test]
    fn test_segments_shorter_than_min_duration_dropped() {
        let segments = extract_segments(&[true, false, false, false], 4, 160, 400, 0, 1600, 10000);
        assert!(segments.is_empty());
    }
}
