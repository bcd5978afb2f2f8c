//! Balanced incremental training of a single new class
//!
//! Adding a speaker must not disturb the fleet: only the new binary
//! classifier is trained, against a negative subsample sized so its
//! negative/positive ratio matches the average the existing classifiers
//! were trained with.

use crate::train_binary::{train_binary, TrainedClassifier};
use crate::train_ova::feature_matrix;
use crate::SvmModel;
use ndarray::Array2;
use tracing::{debug, info};
use voice_biometric_common::{Deadline, EngineError, Result, SvmConfig};
use voice_biometric_dataset::Dataset;

/// Train the classifier for `new_class` against a balanced negative
/// subsample of the current dataset. Existing classifiers are untouched.
///
/// # Errors
/// Fails when the class already exists in the model, is absent from the
/// dataset, or the dataset dimension disagrees with the model.
pub fn train_incremental(
    model: &SvmModel,
    dataset: &Dataset,
    new_class: i32,
    config: &SvmConfig,
    deadline: &Deadline,
) -> Result<TrainedClassifier> {
    if model.is_empty() {
        return Err(EngineError::ModelNotLoaded(
            "incremental training needs an existing model".to_string(),
        ));
    }
    if model.classifier(new_class).is_some() {
        return Err(EngineError::InputMalformed(format!(
            "class {new_class} already exists in the model"
        )));
    }

    let dimension = dataset.dimension().ok_or_else(|| {
        EngineError::InputMalformed("cannot train on an empty dataset".to_string())
    })?;
    if dimension != model.dimension() {
        return Err(EngineError::DimensionMismatch {
            expected: model.dimension(),
            actual: dimension,
        });
    }

    let counts = dataset.class_counts();
    let positives = *counts.get(&new_class).ok_or_else(|| {
        EngineError::InputMalformed(format!("class {new_class} has no samples in the dataset"))
    })?;

    // Average negative/positive ratio across the classifiers already in
    // service, measured on the current dataset.
    let total = dataset.len();
    let mut ratio_sum = 0.0;
    let mut ratio_count = 0usize;
    for class_id in model.classes() {
        if let Some(&pos) = counts.get(&class_id) {
            if pos > 0 {
                ratio_sum += (total - pos) as f64 / pos as f64;
                ratio_count += 1;
            }
        }
    }
    let fleet_ratio = if ratio_count > 0 {
        ratio_sum / ratio_count as f64
    } else {
        1.0
    };

    let negative_indices: Vec<usize> = dataset
        .labels
        .iter()
        .enumerate()
        .filter(|(_, &label)| label != new_class)
        .map(|(idx, _)| idx)
        .collect();

    let target_negatives = ((fleet_ratio * positives as f64).round() as usize)
        .clamp(1, negative_indices.len());

    debug!(
        new_class,
        positives, fleet_ratio, target_negatives, "balanced incremental subsample"
    );

    // Seeded uniform subsample without replacement
    let mut rng = fastrand::Rng::with_seed(config.seed ^ (i64::from(new_class) as u64));
    let mut shuffled = negative_indices;
    rng.shuffle(&mut shuffled);
    shuffled.truncate(target_negatives);

    let mut fold = Dataset::default();
    for (idx, &label) in dataset.labels.iter().enumerate() {
        if label == new_class {
            fold.push(dataset.features[idx].clone(), label);
        }
    }
    for &idx in &shuffled {
        fold.push(dataset.features[idx].clone(), dataset.labels[idx]);
    }

    let x: Array2<f64> = feature_matrix(&fold)?;
    let y: Vec<f64> = fold
        .labels
        .iter()
        .map(|&label| if label == new_class { 1.0 } else { -1.0 })
        .collect();

    let trained = train_binary(&x, &y, new_class, config, deadline)?;

    info!(
        new_class,
        positives,
        negatives = target_negatives,
        epochs = trained.epochs_run,
        "incremental classifier trained"
    );

    Ok(trained)
}
