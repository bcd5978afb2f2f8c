//! Train/test splitting
//!
//! Both modes keep every speaker on both sides of the split: the ratio mode
//! splits per speaker by proportion, the manual mode takes fixed counts per
//! speaker. Shuffles are seeded so a split is reproducible.

use crate::Dataset;
use std::collections::BTreeMap;
use tracing::warn;
use voice_biometric_common::{DatasetConfig, EngineError, Result};

/// Speakers with fewer samples than the configured minimum.
#[must_use]
pub fn speakers_below_minimum(dataset: &Dataset, min_samples: usize) -> Vec<i32> {
    dataset
        .class_counts()
        .into_iter()
        .filter(|(_, count)| *count < min_samples)
        .map(|(class, _)| class)
        .collect()
}

fn indices_by_class(dataset: &Dataset) -> BTreeMap<i32, Vec<usize>> {
    let mut by_class: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in dataset.labels.iter().enumerate() {
        by_class.entry(label).or_default().push(idx);
    }
    by_class
}

fn collect(dataset: &Dataset, indices: &[usize]) -> Dataset {
    let mut out = Dataset::default();
    for &idx in indices {
        out.push(dataset.features[idx].clone(), dataset.labels[idx]);
    }
    out
}

/// Per-speaker proportional split.
///
/// # Errors
/// Fails if the ratio is outside (0, 1).
pub fn split_ratio(dataset: &Dataset, train_ratio: f64, seed: u64) -> Result<(Dataset, Dataset)> {
    if !(train_ratio > 0.0 && train_ratio < 1.0) {
        return Err(EngineError::InputMalformed(format!(
            "train ratio {train_ratio} outside (0, 1)"
        )));
    }

    let mut rng = fastrand::Rng::with_seed(seed);
    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();

    for (_, mut indices) in indices_by_class(dataset) {
        rng.shuffle(&mut indices);
        let train_count = ((indices.len() as f64) * train_ratio).floor() as usize;
        let train_count = train_count.clamp(1.min(indices.len()), indices.len());
        train_indices.extend_from_slice(&indices[..train_count]);
        test_indices.extend_from_slice(&indices[train_count..]);
    }

    Ok((collect(dataset, &train_indices), collect(dataset, &test_indices)))
}

/// Fixed per-speaker split: `train_per_speaker` + `test_per_speaker`
/// samples, taken after a seeded shuffle.
///
/// Speakers with too few samples to fill both sides are left out entirely
/// (with a warning) so the test fold never goes empty for a trained class.
///
/// # Errors
/// Fails if no speaker has enough samples.
pub fn split_manual(dataset: &Dataset, config: &DatasetConfig) -> Result<(Dataset, Dataset)> {
    let needed = config.train_per_speaker + config.test_per_speaker;
    let mut rng = fastrand::Rng::with_seed(config.seed);

    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();

    for (class, mut indices) in indices_by_class(dataset) {
        if indices.len() < needed {
            warn!(
                class,
                available = indices.len(),
                needed,
                "speaker left out of split"
            );
            continue;
        }
        rng.shuffle(&mut indices);
        train_indices.extend_from_slice(&indices[..config.train_per_speaker]);
        test_indices.extend_from_slice(&indices[config.train_per_speaker..needed]);
    }

    if train_indices.is_empty() {
        return Err(EngineError::InputMalformed(format!(
            "no speaker has the {needed} samples the manual split requires"
        )));
    }

    Ok((collect(dataset, &train_indices), collect(dataset, &test_indices)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset_with(counts: &[(i32, usize)]) -> Dataset {
        let mut ds = Dataset::default();
        let mut v = 0.0;
        for &(class, count) in counts {
            for _ in 0..count {
                ds.push(vec![v, v + 1.0], class);
                v += 2.0;
            }
        }
        ds
    }

    #[test]
    fn test_ratio_split_keeps_all_speakers_in_train() {
        let ds = dataset_with(&[(1, 10), (2, 10)]);
        let (train, test) = split_ratio(&ds, 0.8, 42).unwrap();
        assert_eq!(train.len(), 16);
        assert_eq!(test.len(), 4);
        assert_eq!(train.classes(), vec![1, 2]);
        assert_eq!(test.classes(), vec![1, 2]);
    }

    #[test]
    fn test_ratio_split_rejects_bad_ratio() {
        let ds = dataset_with(&[(1, 10)]);
        assert!(split_ratio(&ds, 0.0, 42).is_err());
        assert!(split_ratio(&ds, 1.0, 42).is_err());
    }

    #[test]
    fn test_manual_split_takes_fixed_counts() {
        let ds = dataset_with(&[(1, 7), (2, 8)]);
        let config = DatasetConfig::default(); // 6 train + 1 test
        let (train, test) = split_manual(&ds, &config).unwrap();
        assert_eq!(train.class_counts()[&1], 6);
        assert_eq!(train.class_counts()[&2], 6);
        assert_eq!(test.class_counts()[&1], 1);
        assert_eq!(test.class_counts()[&2], 1);
    }

    #[test]
    fn test_manual_split_skips_short_speakers() {
        let ds = dataset_with(&[(1, 7), (2, 3)]);
        let (train, test) = split_manual(&ds, &DatasetConfig::default()).unwrap();
        assert_eq!(train.classes(), vec![1]);
        assert_eq!(test.classes(), vec![1]);
    }

    #[test]
    fn test_split_is_reproducible() {
        let ds = dataset_with(&[(1, 10), (2, 10)]);
        let (a_train, _) = split_ratio(&ds, 0.8, 7).unwrap();
        let (b_train, _) = split_ratio(&ds, 0.8, 7).unwrap();
        assert_eq!(a_train.features, b_train.features);
        assert_eq!(a_train.labels, b_train.labels);
    }

    #[test]
    fn test_speakers_below_minimum() {
        let ds = dataset_with(&[(1, 7), (2, 3)]);
        assert_eq!(speakers_below_minimum(&ds, 7), vec![2]);
    }
}
