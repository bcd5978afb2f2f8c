//! One-vs-all linear SVM: model, metrics, and trainers
//!
//! Each enrolled speaker gets one binary hinge-loss classifier trained
//! against everyone else. The multiclass prediction is the argmax of the
//! raw scores. Training is Adam-optimised with class-balanced weighting,
//! metric-driven early stopping, and collapse rollback; an incremental path
//! trains a single new class without touching the rest of the fleet.

pub mod metrics;
pub mod model;
pub mod train_binary;
pub mod train_incremental;
pub mod train_ova;

pub use metrics::{evaluate_multiclass, BiometricRates, ClassMetrics, MulticlassEvaluation};
pub use model::{BinaryClassifier, SvmModel};
pub use train_binary::{train_binary, TrainedClassifier};
pub use train_incremental::train_incremental;
pub use train_ova::{train_one_vs_all, TrainingReport};
