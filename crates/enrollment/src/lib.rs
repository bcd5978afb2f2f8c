//! Speaker enrolment orchestration
//!
//! Enrolment validates the identity against the user directory, extracts
//! augmented feature vectors from the provided recordings, appends them to
//! the dataset, and trains: a full one-vs-all run the first time a model
//! can exist, a balanced incremental run for every speaker after that.
//! Existing classifiers are never retrained by the incremental path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use voice_biometric_auth::UserDirectory;
use voice_biometric_common::{AudioBuffer, Deadline, EngineConfig, EngineError, Result};
use voice_biometric_dataset::{append_samples, load_dataset};
use voice_biometric_model_store::{ModelHandle, ModelStore};
use voice_biometric_pipeline::FeaturePipeline;
use voice_biometric_svm::{train_incremental, train_one_vs_all};

/// What the enrolment run did to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingKind {
    /// Full one-vs-all training produced a model with this many classes
    Full { num_classes: usize },
    /// Only the new speaker's classifier was trained and committed
    Incremental,
    /// Samples stored, but too few classes exist to train a model yet
    DatasetOnly,
}

/// Result of a successful enrolment.
#[derive(Debug, Clone)]
pub struct EnrollmentOutcome {
    pub class_id: i32,
    pub identifier: String,
    pub samples_added: usize,
    pub training: TrainingKind,
    /// Classes whose classifier came out degenerate (full training only)
    pub degenerate_classes: Vec<i32>,
    pub elapsed_ms: u64,
}

/// Orchestrates enrolment against one dataset file and one model store.
pub struct Enroller {
    pipeline: FeaturePipeline,
    dataset_path: PathBuf,
    store: ModelStore,
}

impl Enroller {
    #[must_use]
    pub fn new(config: EngineConfig, dataset_path: impl Into<PathBuf>, store: ModelStore) -> Self {
        Self {
            pipeline: FeaturePipeline::new(config),
            dataset_path: dataset_path.into(),
            store,
        }
    }

    #[must_use]
    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    fn config(&self) -> &EngineConfig {
        self.pipeline.config()
    }

    /// Identity map for the authenticator: class id to external identifier.
    ///
    /// Speaker ids double as identifiers on the wire, so the mapping is the
    /// stringified class id; building it here keeps that rule in one place.
    ///
    /// # Errors
    /// Propagates model-store load failures.
    pub fn identity_map(&self) -> Result<BTreeMap<i32, String>> {
        let model = self.store.load()?;
        Ok(model
            .classes()
            .into_iter()
            .map(|class_id| (class_id, class_id.to_string()))
            .collect())
    }

    /// Enrol a speaker from raw recordings.
    ///
    /// # Errors
    /// `IdentityRejected` when the identifier is unknown to the directory,
    /// `DuplicateCredential` when a voice credential already exists,
    /// `InputMalformed` when too few usable recordings survive the
    /// pipeline, `Cancelled` on deadline expiry (checked before every
    /// commit point), plus training and store failures.
    pub fn enroll(
        &self,
        identifier: &str,
        audios: &[AudioBuffer],
        directory: &dyn UserDirectory,
        handle: Option<&ModelHandle>,
        deadline: &Deadline,
    ) -> Result<EnrollmentOutcome> {
        deadline.check()?;

        // 1. The claimed identity must exist and must not already be enrolled
        let user = directory
            .lookup_user(identifier)?
            .ok_or_else(|| EngineError::IdentityRejected(identifier.to_string()))?;
        if user.has_voice_credential {
            return Err(EngineError::DuplicateCredential(identifier.to_string()));
        }

        let class_id: i32 = identifier.parse().map_err(|_| {
            EngineError::InputMalformed(format!(
                "identifier {identifier:?} is not a numeric speaker id"
            ))
        })?;

        if self.store.exists() {
            let model = self.store.load()?;
            if model.classifier(class_id).is_some() {
                return Err(EngineError::DuplicateCredential(identifier.to_string()));
            }
        }

        // 2. Extract augmented feature vectors from every usable recording
        let per_audio = self.pipeline.extract_batch(audios, deadline)?;
        let vectors: Vec<Vec<f64>> = per_audio.into_iter().flatten().collect();

        let minimum = self.config().dataset.train_per_speaker;
        if vectors.len() < minimum {
            return Err(EngineError::InputMalformed(format!(
                "{} usable recordings, enrolment needs at least {minimum}",
                vectors.len()
            )));
        }

        // 3. Append to the dataset under the new class id
        deadline.check()?;
        let labels = vec![class_id; vectors.len()];
        append_samples(&self.dataset_path, &vectors, &labels)?;
        info!(class_id, samples = vectors.len(), "enrolment samples stored");

        // 4. Credential goes to the directory before the model commit
        directory.register_biometric_credential(user.user_id, "voice")?;

        // 5. Train: incremental when a model exists, full otherwise
        let dataset = load_dataset(&self.dataset_path)?;
        let mut degenerate_classes = Vec::new();

        let training = if self.store.exists() {
            let model = self.store.load()?;
            let trained =
                train_incremental(&model, &dataset, class_id, &self.config().svm, deadline)?;
            if trained.degenerate {
                warn!(class_id, "incremental classifier is degenerate");
                degenerate_classes.push(class_id);
            }
            self.store.add_class(&trained.classifier)?;
            TrainingKind::Incremental
        } else if dataset.classes().len() >= 2 {
            let report = train_one_vs_all(&dataset, &self.config().svm, deadline)?;
            degenerate_classes = report.degenerate_classes.clone();
            self.store.save_full(&report.model)?;
            TrainingKind::Full {
                num_classes: report.model.num_classes(),
            }
        } else {
            info!(class_id, "first speaker stored; waiting for a second class to train");
            TrainingKind::DatasetOnly
        };

        // 6. Readers swap to the committed model
        if let Some(handle) = handle {
            if self.store.exists() {
                handle.reload_from(&self.store)?;
            }
        }

        Ok(EnrollmentOutcome {
            class_id,
            identifier: identifier.to_string(),
            samples_added: vectors.len(),
            training,
            degenerate_classes,
            elapsed_ms: deadline.elapsed_ms(),
        })
    }
}
