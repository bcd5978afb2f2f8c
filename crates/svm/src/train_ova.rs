//! One-vs-all wrapper
//!
//! Builds one binary fold per class (`+1` for the class, `-1` for the rest)
//! and runs the per-class trainer over each, in ascending class order so a
//! fixed seed reproduces the whole model.

use crate::metrics::ClassMetrics;
use crate::model::SvmModel;
use crate::train_binary::train_binary;
use ndarray::Array2;
use std::collections::BTreeMap;
use tracing::{info, warn};
use voice_biometric_common::{Deadline, EngineError, Result, SvmConfig};
use voice_biometric_dataset::Dataset;

/// Result of a full one-vs-all training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model: SvmModel,
    pub per_class: BTreeMap<i32, ClassMetrics>,
    /// Classes whose classifier stayed degenerate after restarts
    pub degenerate_classes: Vec<i32>,
}

/// Convert the dataset's feature rows into one contiguous matrix.
///
/// # Errors
/// Fails when rows disagree on dimension.
pub(crate) fn feature_matrix(dataset: &Dataset) -> Result<Array2<f64>> {
    let dimension = dataset.dimension().ok_or_else(|| {
        EngineError::InputMalformed("cannot train on an empty dataset".to_string())
    })?;

    let mut flat = Vec::with_capacity(dataset.len() * dimension);
    for row in &dataset.features {
        if row.len() != dimension {
            return Err(EngineError::DimensionMismatch {
                expected: dimension,
                actual: row.len(),
            });
        }
        flat.extend_from_slice(row);
    }

    Array2::from_shape_vec((dataset.len(), dimension), flat)
        .map_err(|e| EngineError::InputMalformed(e.to_string()))
}

/// Train a classifier for every class in the dataset.
///
/// # Errors
/// Fails on an empty or single-class dataset, on inconsistent dimensions,
/// or when the deadline expires mid-run (no partial model is returned).
pub fn train_one_vs_all(
    dataset: &Dataset,
    config: &SvmConfig,
    deadline: &Deadline,
) -> Result<TrainingReport> {
    let classes = dataset.classes();
    if classes.len() < 2 {
        return Err(EngineError::InputMalformed(format!(
            "one-vs-all needs at least 2 classes, got {}",
            classes.len()
        )));
    }

    let x = feature_matrix(dataset)?;
    let dimension = x.ncols();

    info!(
        classes = classes.len(),
        samples = dataset.len(),
        dimension,
        "training one-vs-all model"
    );

    let mut model = SvmModel::new(dimension);
    let mut per_class = BTreeMap::new();
    let mut degenerate_classes = Vec::new();

    for &class_id in &classes {
        deadline.check()?;

        let y: Vec<f64> = dataset
            .labels
            .iter()
            .map(|&label| if label == class_id { 1.0 } else { -1.0 })
            .collect();

        let trained = train_binary(&x, &y, class_id, config, deadline)?;
        if trained.degenerate {
            warn!(class_id, "keeping degenerate classifier");
            degenerate_classes.push(class_id);
        }

        per_class.insert(class_id, trained.metrics);
        model.insert(trained.classifier)?;
    }

    Ok(TrainingReport {
        model,
        per_class,
        degenerate_classes,
    })
}
