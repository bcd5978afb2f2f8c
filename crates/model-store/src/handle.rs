//! Snapshot-swap sharing of the live model
//!
//! Readers clone a cheap `Arc` to the current immutable snapshot; a writer
//! builds the next model (normally by reloading from disk after a training
//! commit) and swaps the pointer. A reader never observes a partially
//! mutated model, and an authentication that started before a swap keeps
//! scoring against its own snapshot.

use crate::error::ModelLoadError;
use crate::store::ModelStore;
use std::sync::{Arc, RwLock};
use tracing::info;
use voice_biometric_svm::SvmModel;

pub struct ModelHandle {
    current: RwLock<Arc<SvmModel>>,
}

impl ModelHandle {
    #[must_use]
    pub fn new(model: SvmModel) -> Self {
        Self {
            current: RwLock::new(Arc::new(model)),
        }
    }

    /// Load the initial snapshot from a store.
    ///
    /// # Errors
    /// Propagates load failures.
    pub fn from_store(store: &ModelStore) -> Result<Self, ModelLoadError> {
        Ok(Self::new(store.load()?))
    }

    /// The current immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SvmModel> {
        self.current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Atomically replace the snapshot.
    pub fn replace(&self, model: SvmModel) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Arc::new(model);
        info!(classes = guard.num_classes(), "model snapshot swapped");
    }

    /// Reload from disk and swap; the store commit must already have
    /// happened.
    ///
    /// # Errors
    /// Propagates load failures, leaving the previous snapshot in place.
    pub fn reload_from(&self, store: &ModelStore) -> Result<(), ModelLoadError> {
        let model = store.load()?;
        self.replace(model);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_biometric_svm::BinaryClassifier;

    fn model_with_class(class_id: i32) -> SvmModel {
        let mut model = SvmModel::new(2);
        model
            .insert(BinaryClassifier {
                class_id,
                weights: vec![1.0, 0.0],
                bias: 0.0,
            })
            .unwrap();
        model
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let handle = ModelHandle::new(model_with_class(1));
        let old = handle.snapshot();

        handle.replace(model_with_class(2));

        // The old snapshot still sees class 1; new readers see class 2
        assert_eq!(old.classes(), vec![1]);
        assert_eq!(handle.snapshot().classes(), vec![2]);
    }

    #[test]
    fn test_concurrent_readers_share_snapshot() {
        let handle = std::sync::Arc::new(ModelHandle::new(model_with_class(1)));
        let mut threads = Vec::new();
        for _ in 0..4 {
            let handle = handle.clone();
            threads.push(std::thread::spawn(move || {
                let snapshot = handle.snapshot();
                assert_eq!(snapshot.classes(), vec![1]);
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
    }
}
