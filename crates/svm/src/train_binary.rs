//! Per-class binary trainer
//!
//! Minimises class-weighted hinge loss with an L2 penalty using Adam over
//! shuffled mini-batches. Every epoch is scored on the training fold;
//! the best non-collapsed snapshot wins. A snapshot with saturated recall
//! and broken specificity is a collapse onto the positive class and is
//! never kept. Degenerate outcomes trigger a bounded number of fresh
//! re-initialisations.

use crate::metrics::ClassMetrics;
use crate::model::BinaryClassifier;
use ndarray::Array2;
use tracing::{debug, info, warn};
use voice_biometric_common::{Deadline, EngineError, Result, SvmConfig};

const DEGENERATE_NORM: f64 = 1e-8;

/// Outcome of one binary training run.
#[derive(Debug, Clone)]
pub struct TrainedClassifier {
    pub classifier: BinaryClassifier,
    /// Training-fold metrics of the snapshot that was kept
    pub metrics: ClassMetrics,
    pub epochs_run: usize,
    pub restarts: usize,
    /// Set when the classifier is still degenerate after all restarts
    pub degenerate: bool,
}

/// Train one binary classifier for `class_id`.
///
/// `y` holds `+1.0` for the target class and `-1.0` for everything else.
///
/// # Errors
/// Fails on an empty or single-class fold, on mismatched lengths, or when
/// the deadline expires (checked every epoch, nothing is committed).
pub fn train_binary(
    x: &Array2<f64>,
    y: &[f64],
    class_id: i32,
    config: &SvmConfig,
    deadline: &Deadline,
) -> Result<TrainedClassifier> {
    let n = x.nrows();
    if n == 0 || n != y.len() {
        return Err(EngineError::InputMalformed(format!(
            "{} samples for {} labels",
            n,
            y.len()
        )));
    }

    let positives = y.iter().filter(|&&v| v > 0.0).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return Err(EngineError::InputMalformed(format!(
            "class {class_id}: need both folds, got {positives} positives / {negatives} negatives"
        )));
    }

    let ratio = negatives as f64 / positives as f64;
    let positive_weight = positive_class_weight(ratio, config);
    let patience = if positives < config.minority_threshold {
        config.patience_minority
    } else {
        config.patience
    };

    debug!(
        class_id,
        positives, negatives, positive_weight, patience, "starting binary training"
    );

    let mut last_outcome = None;

    for restart in 0..=config.max_restarts {
        let outcome = run_training(
            x,
            y,
            class_id,
            config,
            deadline,
            positive_weight,
            patience,
            restart,
        )?;

        if !outcome.degenerate {
            info!(
                class_id,
                epochs = outcome.epochs_run,
                restarts = restart,
                recall = outcome.metrics.recall(),
                specificity = outcome.metrics.specificity(),
                f1 = outcome.metrics.f1(),
                "binary classifier trained"
            );
            return Ok(outcome);
        }

        debug!(class_id, restart, "degenerate classifier, re-initialising");
        last_outcome = Some(outcome);
    }

    let outcome = last_outcome.expect("at least one restart ran");
    warn!(
        class_id,
        restarts = config.max_restarts,
        "classifier still degenerate after restarts"
    );
    Ok(outcome)
}

/// Positive-class weight from the imbalance ratio.
fn positive_class_weight(ratio: f64, config: &SvmConfig) -> f64 {
    let w = &config.weighting;
    let raw = if w.logarithmic {
        w.conservative_factor * (1.0 + ratio).ln()
    } else {
        w.conservative_factor * ratio
    };
    raw.clamp(w.weight_min, w.weight_max)
}

fn mix_seed(base: u64, class_id: i32, restart: usize) -> u64 {
    base ^ (i64::from(class_id) as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (restart as u64).wrapping_mul(0xD1B5_4A32_D192_ED03)
}

struct Snapshot {
    weights: Vec<f64>,
    bias: f64,
    metrics: ClassMetrics,
    score: f64,
}

#[allow(clippy::too_many_arguments)]
fn run_training(
    x: &Array2<f64>,
    y: &[f64],
    class_id: i32,
    config: &SvmConfig,
    deadline: &Deadline,
    positive_weight: f64,
    patience: usize,
    restart: usize,
) -> Result<TrainedClassifier> {
    let n = x.nrows();
    let d = x.ncols();
    let mut rng = fastrand::Rng::with_seed(mix_seed(config.seed, class_id, restart));

    let mut weights = xavier_init(d, &mut rng);
    let mut bias = 0.0;

    let mut adam = AdamState::new(d);
    let mut indices: Vec<usize> = (0..n).collect();

    let mut best: Option<Snapshot> = None;
    let mut epochs_without_improvement = 0usize;
    let mut epochs_run = 0usize;

    let mut gradient = vec![0.0; d];

    for epoch in 0..config.epochs_max {
        deadline.check()?;
        epochs_run = epoch + 1;

        rng.shuffle(&mut indices);

        for batch in indices.chunks(config.batch_size.max(1)) {
            gradient.iter_mut().for_each(|g| *g = 0.0);
            let mut bias_gradient = 0.0;
            let inv = 1.0 / batch.len() as f64;

            for &i in batch {
                let row = x.row(i);
                let label = y[i];
                let margin = label * (dot(&weights, row.as_slice().unwrap_or(&[])) + bias);
                if margin < 1.0 {
                    let sample_weight = if label > 0.0 { positive_weight } else { 1.0 };
                    let scale = sample_weight * label * inv;
                    for (g, &value) in gradient.iter_mut().zip(row.iter()) {
                        *g -= scale * value;
                    }
                    bias_gradient -= scale;
                }
            }

            // L2 penalty gradient: w / C
            for (g, &w) in gradient.iter_mut().zip(weights.iter()) {
                *g += w / config.c;
            }

            adam.step(&mut weights, &mut bias, &gradient, bias_gradient, config);
        }

        let metrics = evaluate(x, y, &weights, bias);
        let collapsed = metrics.recall() >= config.collapse_recall
            && metrics.specificity() < config.floors.specificity;
        let score = composite_score(&metrics, config);

        let improved = !collapsed && best.as_ref().is_none_or(|b| score > b.score);
        if improved {
            best = Some(Snapshot {
                weights: weights.clone(),
                bias,
                metrics,
                score,
            });
            epochs_without_improvement = 0;
        } else {
            epochs_without_improvement += 1;
        }

        if epochs_run >= config.min_epochs && epochs_without_improvement >= patience {
            debug!(class_id, epoch, "early stop: patience exhausted");
            break;
        }
    }

    // Fall back to the final parameters only when every epoch collapsed
    let (best_weights, best_bias, best_metrics) = match best {
        Some(snapshot) => (snapshot.weights, snapshot.bias, snapshot.metrics),
        None => {
            let metrics = evaluate(x, y, &weights, bias);
            (weights, bias, metrics)
        }
    };

    let degenerate = is_degenerate(x, &best_weights, best_bias);

    Ok(TrainedClassifier {
        classifier: BinaryClassifier {
            class_id,
            weights: best_weights,
            bias: best_bias,
        },
        metrics: best_metrics,
        epochs_run,
        restarts: restart,
        degenerate,
    })
}

/// Gaussian init with std `sqrt(2 / (D + 1))`, via Box-Muller over the
/// seeded uniform generator.
fn xavier_init(dimension: usize, rng: &mut fastrand::Rng) -> Vec<f64> {
    let sigma = (2.0 / (dimension as f64 + 1.0)).sqrt();
    (0..dimension)
        .map(|_| {
            let u1 = 1.0 - rng.f64(); // (0, 1]
            let u2 = rng.f64();
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            sigma * z
        })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn evaluate(x: &Array2<f64>, y: &[f64], weights: &[f64], bias: f64) -> ClassMetrics {
    let predictions: Vec<bool> = (0..x.nrows())
        .map(|i| dot(weights, x.row(i).as_slice().unwrap_or(&[])) + bias >= 0.0)
        .collect();
    ClassMetrics::from_predictions(&predictions, y)
}

/// Composite early-stopping score: F1-led, with bonuses for clearing the
/// configured floors so a snapshot that satisfies all three is always
/// preferred over one that trades them away.
fn composite_score(metrics: &ClassMetrics, config: &SvmConfig) -> f64 {
    let floors = &config.floors;
    let mut score = metrics.f1() + 0.5 * metrics.specificity() + 0.25 * metrics.recall();
    if metrics.specificity() >= floors.specificity {
        score += 50.0;
    }
    if metrics.recall() >= floors.recall {
        score += 25.0;
    }
    if metrics.f1() >= floors.f1 {
        score += 25.0;
    }
    score
}

fn is_degenerate(x: &Array2<f64>, weights: &[f64], bias: f64) -> bool {
    let norm = dot(weights, weights).sqrt();
    if norm < DEGENERATE_NORM {
        return true;
    }

    let first = dot(weights, x.row(0).as_slice().unwrap_or(&[])) + bias >= 0.0;
    (1..x.nrows()).all(|i| (dot(weights, x.row(i).as_slice().unwrap_or(&[])) + bias >= 0.0) == first)
}

struct AdamState {
    m: Vec<f64>,
    v: Vec<f64>,
    m_bias: f64,
    v_bias: f64,
    t: u64,
}

impl AdamState {
    fn new(dimension: usize) -> Self {
        Self {
            m: vec![0.0; dimension],
            v: vec![0.0; dimension],
            m_bias: 0.0,
            v_bias: 0.0,
            t: 0,
        }
    }

    fn step(
        &mut self,
        weights: &mut [f64],
        bias: &mut f64,
        gradient: &[f64],
        bias_gradient: f64,
        config: &SvmConfig,
    ) {
        self.t += 1;
        let b1 = config.adam_beta1;
        let b2 = config.adam_beta2;
        let bias_correction1 = 1.0 - b1.powi(self.t as i32);
        let bias_correction2 = 1.0 - b2.powi(self.t as i32);

        for ((w, g), (m, v)) in weights
            .iter_mut()
            .zip(gradient)
            .zip(self.m.iter_mut().zip(self.v.iter_mut()))
        {
            *m = b1 * *m + (1.0 - b1) * g;
            *v = b2 * *v + (1.0 - b2) * g * g;
            let m_hat = *m / bias_correction1;
            let v_hat = *v / bias_correction2;
            *w -= config.learning_rate * m_hat / (v_hat.sqrt() + config.adam_epsilon);
        }

        self.m_bias = b1 * self.m_bias + (1.0 - b1) * bias_gradient;
        self.v_bias = b2 * self.v_bias + (1.0 - b2) * bias_gradient * bias_gradient;
        let m_hat = self.m_bias / bias_correction1;
        let v_hat = self.v_bias / bias_correction2;
        *bias -= config.learning_rate * m_hat / (v_hat.sqrt() + config.adam_epsilon);
    }
}
