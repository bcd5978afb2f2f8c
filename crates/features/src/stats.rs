//! Temporal statistics over the MFCC matrix
//!
//! Collapses a variable-length `frames x coefficients` matrix into a fixed
//! vector: five statistics per coefficient, coefficient-major order
//! `[mean, std, min, max, mean-delta]` for c = 0, 1, ...

/// Number of statistics emitted per coefficient.
pub const STATS_PER_COEFFICIENT: usize = 5;

/// Summarise the MFCC matrix into `5 * num_coefficients` features.
///
/// Returns an empty vector when the matrix has no frames; the std is the
/// population deviation and the delta is the mean first-order difference
/// (zero with a single frame).
#[must_use]
pub fn mfcc_statistics(mfcc: &[Vec<f64>]) -> Vec<f64> {
    let num_frames = mfcc.len();
    if num_frames == 0 {
        return Vec::new();
    }
    let num_coefficients = mfcc[0].len();

    let mut features = Vec::with_capacity(num_coefficients * STATS_PER_COEFFICIENT);

    for c in 0..num_coefficients {
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut delta_sum = 0.0;

        for (t, frame) in mfcc.iter().enumerate() {
            let value = frame[c];
            sum += value;
            min = min.min(value);
            max = max.max(value);
            if t > 0 {
                delta_sum += value - mfcc[t - 1][c];
            }
        }

        let mean = sum / num_frames as f64;

        let variance = mfcc
            .iter()
            .map(|frame| {
                let d = frame[c] - mean;
                d * d
            })
            .sum::<f64>()
            / num_frames as f64;

        let mean_delta = if num_frames > 1 {
            delta_sum / (num_frames - 1) as f64
        } else {
            0.0
        };

        features.push(mean);
        features.push(variance.sqrt());
        features.push(min);
        features.push(max);
        features.push(mean_delta);
    }

    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_is_five_per_coefficient() {
        let mfcc = vec![vec![1.0; 50]; 10];
        assert_eq!(mfcc_statistics(&mfcc).len(), 250);
    }

    #[test]
    fn test_constant_signal_statistics() {
        let mfcc = vec![vec![3.0, -1.0]; 5];
        let stats = mfcc_statistics(&mfcc);
        // coefficient 0: mean 3, std 0, min 3, max 3, delta 0
        assert_eq!(&stats[0..5], &[3.0, 0.0, 3.0, 3.0, 0.0]);
        // coefficient 1: mean -1, std 0, min -1, max -1, delta 0
        assert_eq!(&stats[5..10], &[-1.0, 0.0, -1.0, -1.0, 0.0]);
    }

    #[test]
    fn test_linear_ramp_statistics() {
        // Coefficient rises 0,1,2,3: mean 1.5, min 0, max 3, mean-delta 1
        let mfcc: Vec<Vec<f64>> = (0..4).map(|t| vec![t as f64]).collect();
        let stats = mfcc_statistics(&mfcc);
        assert!((stats[0] - 1.5).abs() < 1e-12);
        assert!((stats[1] - (1.25_f64).sqrt()).abs() < 1e-12);
        assert_eq!(stats[2], 0.0);
        assert_eq!(stats[3], 3.0);
        assert!((stats[4] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_frame_has_zero_delta() {
        let stats = mfcc_statistics(&[vec![2.0, 4.0]]);
        assert_eq!(stats[4], 0.0);
        assert_eq!(stats[9], 0.0);
    }

    #[test]
    fn test_empty_matrix_yields_empty_vector() {
        assert!(mfcc_statistics(&[]).is_empty());
    }
}
