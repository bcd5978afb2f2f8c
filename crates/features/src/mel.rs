//! Triangular mel filterbank
//!
//! Filters are equally spaced on the mel scale between the configured edge
//! frequencies; each filter's response at a linear FFT bin is piecewise
//! linear between its centre and the two adjacent centres.

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Build a flattened `num_filters x num_bins` filterbank matrix.
///
/// `num_bins` is the spectrogram bin count (`fft_size / 2 + 1`); bin `k`
/// corresponds to frequency `k * sample_rate / fft_size`.
#[must_use]
pub fn mel_filterbank(
    num_filters: usize,
    num_bins: usize,
    fft_size: usize,
    sample_rate: u32,
    f_min: f64,
    f_max: f64,
) -> Vec<f64> {
    let nyquist = f64::from(sample_rate) / 2.0;
    let f_max = f_max.min(nyquist);

    let mel_low = hz_to_mel(f_min);
    let mel_high = hz_to_mel(f_max);

    // num_filters + 2 edge points, equally spaced in mel
    let bin_points: Vec<f64> = (0..=num_filters + 1)
        .map(|i| {
            let mel = mel_low + (mel_high - mel_low) * i as f64 / (num_filters + 1) as f64;
            mel_to_hz(mel) * fft_size as f64 / f64::from(sample_rate)
        })
        .collect();

    let mut filterbank = vec![0.0; num_filters * num_bins];

    for filter_idx in 0..num_filters {
        let left = bin_points[filter_idx];
        let center = bin_points[filter_idx + 1];
        let right = bin_points[filter_idx + 2];

        for bin_idx in 0..num_bins {
            let bin = bin_idx as f64;
            let weight = if bin >= left && bin <= center && center > left {
                (bin - left) / (center - left)
            } else if bin > center && bin <= right && right > center {
                (right - bin) / (right - center)
            } else {
                0.0
            };
            filterbank[filter_idx * num_bins + bin_idx] = weight;
        }
    }

    filterbank
}

/// Weighted sum of spectrum magnitudes per filter.
#[must_use]
pub fn apply_mel_filterbank(spectrum: &[f64], filterbank: &[f64]) -> Vec<f64> {
    let num_bins = spectrum.len();
    let num_filters = filterbank.len() / num_bins;

    let mut energies = Vec::with_capacity(num_filters);
    for filter_idx in 0..num_filters {
        let row = &filterbank[filter_idx * num_bins..(filter_idx + 1) * num_bins];
        let energy: f64 = row.iter().zip(spectrum).map(|(w, m)| w * m).sum();
        energies.push(energy);
    }
    energies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [0.0, 100.0, 1000.0, 4000.0, 8000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn test_filterbank_shape_and_range() {
        let fb = mel_filterbank(40, 257, 512, 16000, 0.0, 8000.0);
        assert_eq!(fb.len(), 40 * 257);
        for &w in &fb {
            assert!((0.0..=1.0).contains(&w));
        }
    }

    #[test]
    fn test_every_filter_has_support() {
        let fb = mel_filterbank(40, 257, 512, 16000, 0.0, 8000.0);
        for filter_idx in 0..40 {
            let row = &fb[filter_idx * 257..(filter_idx + 1) * 257];
            assert!(
                row.iter().any(|&w| w > 0.0),
                "filter {filter_idx} is all-zero"
            );
        }
    }

    #[test]
    fn test_filters_are_triangular() {
        // Weights rise to a single peak then fall
        let fb = mel_filterbank(40, 257, 512, 16000, 0.0, 8000.0);
        let row = &fb[20 * 257..21 * 257];
        let peak = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        for i in 1..=peak {
            assert!(row[i] >= row[i - 1] - 1e-12);
        }
        for i in peak + 1..row.len() {
            assert!(row[i] <= row[i - 1] + 1e-12);
        }
    }

    #[test]
    fn test_apply_filterbank_on_flat_spectrum() {
        let fb = mel_filterbank(10, 129, 256, 16000, 0.0, 8000.0);
        let spectrum = vec![1.0; 129];
        let energies = apply_mel_filterbank(&spectrum, &fb);
        assert_eq!(energies.len(), 10);
        // Flat spectrum: each filter energy equals its weight mass
        for (filter_idx, &e) in energies.iter().enumerate() {
            let row_sum: f64 = fb[filter_idx * 129..(filter_idx + 1) * 129].iter().sum();
            assert!((e - row_sum).abs() < 1e-9);
        }
    }
}
