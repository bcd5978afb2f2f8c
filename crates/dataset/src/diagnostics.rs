//! Dataset health checks before training

use crate::Dataset;
use std::collections::BTreeMap;
use tracing::warn;

/// Summary produced by [`diagnose`].
#[derive(Debug, Clone)]
pub struct DatasetDiagnostics {
    pub num_samples: usize,
    pub dimension: usize,
    pub class_counts: BTreeMap<i32, usize>,
    /// max class count / min class count
    pub imbalance_ratio: f64,
    /// Samples containing NaN or infinite values
    pub invalid_samples: usize,
}

impl DatasetDiagnostics {
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.class_counts.len()
    }
}

/// Scan the dataset for class imbalance and invalid values.
///
/// Returns `None` for an empty dataset. An imbalance ratio above 5 and any
/// invalid sample are logged as warnings; the caller decides whether to
/// proceed.
#[must_use]
pub fn diagnose(dataset: &Dataset) -> Option<DatasetDiagnostics> {
    let dimension = dataset.dimension()?;
    let class_counts = dataset.class_counts();

    let min = class_counts.values().copied().min().unwrap_or(0);
    let max = class_counts.values().copied().max().unwrap_or(0);
    let imbalance_ratio = if min > 0 { max as f64 / min as f64 } else { f64::INFINITY };

    let invalid_samples = dataset
        .features
        .iter()
        .filter(|v| v.iter().any(|x| !x.is_finite()))
        .count();

    if imbalance_ratio > 5.0 {
        warn!(imbalance_ratio, "dataset is heavily imbalanced");
    }
    if invalid_samples > 0 {
        warn!(invalid_samples, "dataset contains non-finite samples");
    }

    Some(DatasetDiagnostics {
        num_samples: dataset.len(),
        dimension,
        class_counts,
        imbalance_ratio,
        invalid_samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnose_counts_and_ratio() {
        let mut ds = Dataset::default();
        for _ in 0..10 {
            ds.push(vec![1.0, 2.0], 1);
        }
        for _ in 0..2 {
            ds.push(vec![3.0, 4.0], 2);
        }

        let diag = diagnose(&ds).unwrap();
        assert_eq!(diag.num_samples, 12);
        assert_eq!(diag.dimension, 2);
        assert_eq!(diag.num_classes(), 2);
        assert!((diag.imbalance_ratio - 5.0).abs() < 1e-12);
        assert_eq!(diag.invalid_samples, 0);
    }

    #[test]
    fn test_diagnose_flags_invalid_samples() {
        let mut ds = Dataset::default();
        ds.push(vec![1.0], 1);
        ds.push(vec![f64::NAN], 1);
        assert_eq!(diagnose(&ds).unwrap().invalid_samples, 1);
    }

    #[test]
    fn test_diagnose_empty_dataset() {
        assert!(diagnose(&Dataset::default()).is_none());
    }
}
