//! Model types shared by training, persistence, and authentication

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use voice_biometric_common::{EngineError, Result};

/// One speaker's binary classifier: a hyperplane in feature space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryClassifier {
    pub class_id: i32,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl BinaryClassifier {
    /// Raw decision score `w · x + b`.
    #[must_use]
    pub fn score(&self, features: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias
    }

    /// Euclidean norm of the weight vector.
    #[must_use]
    pub fn weight_norm(&self) -> f64 {
        self.weights.iter().map(|w| w * w).sum::<f64>().sqrt()
    }

    /// Validate that every entry is finite and the dimension matches.
    ///
    /// # Errors
    /// Returns `ModelCorrupt` on a bad entry, `DimensionMismatch` on a bad
    /// length.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if self.weights.len() != dimension {
            return Err(EngineError::DimensionMismatch {
                expected: dimension,
                actual: self.weights.len(),
            });
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(EngineError::ModelCorrupt(format!(
                "classifier {} has non-finite parameters",
                self.class_id
            )));
        }
        Ok(())
    }
}

/// The live multiclass model: per-class classifiers sharing one dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvmModel {
    dimension: usize,
    classifiers: BTreeMap<i32, BinaryClassifier>,
}

impl SvmModel {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            classifiers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.classifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    /// Class ids, ascending.
    #[must_use]
    pub fn classes(&self) -> Vec<i32> {
        self.classifiers.keys().copied().collect()
    }

    #[must_use]
    pub fn classifier(&self, class_id: i32) -> Option<&BinaryClassifier> {
        self.classifiers.get(&class_id)
    }

    #[must_use]
    pub fn classifiers(&self) -> impl Iterator<Item = &BinaryClassifier> {
        self.classifiers.values()
    }

    /// Insert a classifier, enforcing the shared dimension.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if the weights have the wrong length or
    /// `ModelCorrupt` on non-finite parameters.
    pub fn insert(&mut self, classifier: BinaryClassifier) -> Result<()> {
        classifier.validate(self.dimension)?;
        self.classifiers.insert(classifier.class_id, classifier);
        Ok(())
    }

    /// Remove a classifier; returns whether it existed.
    pub fn remove(&mut self, class_id: i32) -> bool {
        self.classifiers.remove(&class_id).is_some()
    }

    /// Score the feature vector against every class.
    ///
    /// # Errors
    /// Returns `ModelNotLoaded` on an empty model and `DimensionMismatch`
    /// when the vector length differs from the model dimension.
    pub fn score_all(&self, features: &[f64]) -> Result<BTreeMap<i32, f64>> {
        if self.classifiers.is_empty() {
            return Err(EngineError::ModelNotLoaded(
                "no classes trained".to_string(),
            ));
        }
        if features.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: features.len(),
            });
        }

        Ok(self
            .classifiers
            .iter()
            .map(|(&class_id, clf)| (class_id, clf.score(features)))
            .collect())
    }

    /// Predicted class: argmax of the raw scores.
    ///
    /// # Errors
    /// Same conditions as [`Self::score_all`].
    pub fn predict(&self, features: &[f64]) -> Result<i32> {
        let scores = self.score_all(features)?;
        let (&class_id, _) = scores
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .expect("score_all guarantees at least one class");
        Ok(class_id)
    }
}
