//! Classification and biometric metrics
//!
//! Basic per-class metrics drive early stopping; the biometric rates
//! (FAR / FRR / EER) describe the model the way an access-control audit
//! expects. All percentages are in [0, 100].

use crate::SvmModel;
use std::collections::BTreeMap;
use voice_biometric_common::Result;
use voice_biometric_dataset::Dataset;

/// Confusion counts and derived rates for one binary fold.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassMetrics {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl ClassMetrics {
    /// Tally predictions against binary labels (`+1` positive, else
    /// negative).
    #[must_use]
    pub fn from_predictions(predicted: &[bool], labels: &[f64]) -> Self {
        let mut m = Self::default();
        for (&pred, &label) in predicted.iter().zip(labels) {
            match (pred, label > 0.0) {
                (true, true) => m.true_positives += 1,
                (false, false) => m.true_negatives += 1,
                (true, false) => m.false_positives += 1,
                (false, true) => m.false_negatives += 1,
            }
        }
        m
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = self.true_positives + self.true_negatives + self.false_positives
            + self.false_negatives;
        if total == 0 {
            return 0.0;
        }
        100.0 * (self.true_positives + self.true_negatives) as f64 / total as f64
    }

    /// TP / (TP + FN)
    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// TN / (TN + FP)
    #[must_use]
    pub fn specificity(&self) -> f64 {
        ratio(self.true_negatives, self.true_negatives + self.false_positives)
    }

    /// TP / (TP + FP)
    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    #[must_use]
    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    100.0 * numerator as f64 / denominator as f64
}

/// False-acceptance / false-rejection rates with the equal-error point.
#[derive(Debug, Clone, Copy)]
pub struct BiometricRates {
    /// Impostors accepted at the EER threshold (percent)
    pub far: f64,
    /// Genuine claims rejected at the EER threshold (percent)
    pub frr: f64,
    /// Equal error rate (percent)
    pub eer: f64,
    pub eer_threshold: f64,
}

/// Sweep thresholds over the observed scores and locate the point where
/// FAR and FRR cross.
///
/// Returns `None` when either score set is empty.
#[must_use]
pub fn biometric_rates(genuine: &[f64], impostor: &[f64]) -> Option<BiometricRates> {
    if genuine.is_empty() || impostor.is_empty() {
        return None;
    }

    let mut thresholds: Vec<f64> = genuine.iter().chain(impostor).copied().collect();
    thresholds.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut best = BiometricRates {
        far: 100.0,
        frr: 0.0,
        eer: 100.0,
        eer_threshold: thresholds[0],
    };
    let mut best_gap = f64::INFINITY;

    for &threshold in &thresholds {
        let far = 100.0 * impostor.iter().filter(|&&s| s >= threshold).count() as f64
            / impostor.len() as f64;
        let frr = 100.0 * genuine.iter().filter(|&&s| s < threshold).count() as f64
            / genuine.len() as f64;
        let gap = (far - frr).abs();
        if gap < best_gap {
            best_gap = gap;
            best = BiometricRates {
                far,
                frr,
                eer: 0.5 * (far + frr),
                eer_threshold: threshold,
            };
        }
    }

    Some(best)
}

/// Whole-model evaluation over a labeled dataset.
#[derive(Debug, Clone)]
pub struct MulticlassEvaluation {
    /// Argmax accuracy (percent)
    pub accuracy: f64,
    pub per_class: BTreeMap<i32, ClassMetrics>,
    /// Rates over own-class scores vs other-class scores
    pub biometric: Option<BiometricRates>,
}

/// Evaluate the model on a dataset: argmax accuracy, per-class confusion
/// (one-vs-rest over the argmax prediction), and biometric rates computed
/// from every sample's own-class score (genuine) and its scores under every
/// other class (impostor).
///
/// # Errors
/// Fails on an empty model or a dimension mismatch.
pub fn evaluate_multiclass(model: &SvmModel, dataset: &Dataset) -> Result<MulticlassEvaluation> {
    let mut correct = 0usize;
    let mut per_class: BTreeMap<i32, ClassMetrics> = BTreeMap::new();
    let mut genuine = Vec::new();
    let mut impostor = Vec::new();

    for (features, &label) in dataset.features.iter().zip(&dataset.labels) {
        let scores = model.score_all(features)?;
        let predicted = model.predict(features)?;

        if predicted == label {
            correct += 1;
        }

        for (&class_id, &score) in &scores {
            let entry = per_class.entry(class_id).or_default();
            match (predicted == class_id, label == class_id) {
                (true, true) => entry.true_positives += 1,
                (false, false) => entry.true_negatives += 1,
                (true, false) => entry.false_positives += 1,
                (false, true) => entry.false_negatives += 1,
            }

            if label == class_id {
                genuine.push(score);
            } else {
                impostor.push(score);
            }
        }
    }

    let accuracy = if dataset.is_empty() {
        0.0
    } else {
        100.0 * correct as f64 / dataset.len() as f64
    };

    Ok(MulticlassEvaluation {
        accuracy,
        per_class,
        biometric: biometric_rates(&genuine, &impostor),
    })
}
