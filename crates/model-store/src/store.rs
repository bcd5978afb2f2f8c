//! Directory-backed model persistence

use crate::error::ModelLoadError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use voice_biometric_svm::{BinaryClassifier, SvmModel};

const MANIFEST_NAME: &str = "metadata.json";
const LOCK_NAME: &str = ".model.lock";

/// `metadata.json` contents. Invariant: `classes` matches the set of
/// `class_<k>.bin` files in the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub num_classes: usize,
    pub dimension: usize,
    pub classes: Vec<i32>,
}

/// Handle to a model directory.
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Open a store at `dir`, creating the directory if needed.
    ///
    /// # Errors
    /// Fails when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ModelLoadError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_NAME)
    }

    #[must_use]
    pub fn classifier_path(&self, class_id: i32) -> PathBuf {
        self.dir.join(format!("class_{class_id}.bin"))
    }

    /// Whether a manifest exists (i.e. a model has been trained before).
    #[must_use]
    pub fn exists(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Exclusive advisory lock on the model directory; released when the
    /// returned file is dropped.
    fn lock_dir(&self) -> Result<File, ModelLoadError> {
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_NAME))?;
        lock.lock()?;
        Ok(lock)
    }

    /// Load the manifest and every per-class classifier, validating
    /// dimensions and the manifest/file-set match. Never partially mutates
    /// anything: the model is built in memory and returned whole.
    ///
    /// # Errors
    /// All the [`ModelLoadError`] kinds.
    pub fn load(&self) -> Result<SvmModel, ModelLoadError> {
        let manifest = self.read_manifest()?;
        let mut model = SvmModel::new(manifest.dimension);

        for &class_id in &manifest.classes {
            let classifier = self.read_classifier(class_id, manifest.dimension)?;
            model
                .insert(classifier)
                .map_err(|e| ModelLoadError::ClassifierInvalid {
                    class_id,
                    reason: e.to_string(),
                })?;
        }

        // Stray class files mean the manifest and directory disagree
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(class_id) = parse_classifier_name(name) {
                if !manifest.classes.contains(&class_id) {
                    return Err(ModelLoadError::StrayClassifier(name.to_string()));
                }
            }
        }

        if manifest.num_classes != model.num_classes() {
            return Err(ModelLoadError::ManifestInvalid(format!(
                "num_classes {} but {} classifiers",
                manifest.num_classes,
                model.num_classes()
            )));
        }

        debug!(
            classes = model.num_classes(),
            dimension = model.dimension(),
            "model loaded"
        );
        Ok(model)
    }

    /// Write every classifier, then the manifest last.
    ///
    /// # Errors
    /// IO failures; nothing is rolled back, but the manifest-last ordering
    /// keeps the previous manifest authoritative until the final rename.
    pub fn save_full(&self, model: &SvmModel) -> Result<(), ModelLoadError> {
        let _lock = self.lock_dir()?;

        for classifier in model.classifiers() {
            self.write_classifier(classifier)?;
        }
        self.write_manifest(&Manifest {
            num_classes: model.num_classes(),
            dimension: model.dimension(),
            classes: model.classes(),
        })?;

        info!(classes = model.num_classes(), dir = %self.dir.display(), "model saved");
        Ok(())
    }

    /// Add one classifier: write its file, then rewrite the manifest.
    /// Existing classifier files are never rewritten.
    ///
    /// # Errors
    /// Fails when the dimension disagrees with the manifest or on IO.
    pub fn add_class(&self, classifier: &BinaryClassifier) -> Result<(), ModelLoadError> {
        let _lock = self.lock_dir()?;

        let mut manifest = self.read_manifest()?;
        if classifier.weights.len() != manifest.dimension {
            return Err(ModelLoadError::DimensionMismatch {
                class_id: classifier.class_id,
                expected: manifest.dimension,
                actual: classifier.weights.len(),
            });
        }

        self.write_classifier(classifier)?;

        if !manifest.classes.contains(&classifier.class_id) {
            manifest.classes.push(classifier.class_id);
            manifest.classes.sort_unstable();
            manifest.num_classes = manifest.classes.len();
        }
        self.write_manifest(&manifest)?;

        info!(class_id = classifier.class_id, "class added to model store");
        Ok(())
    }

    /// Remove one classifier: delete its file, then rewrite the manifest.
    ///
    /// # Errors
    /// Fails when the class is not in the manifest or on IO.
    pub fn remove_class(&self, class_id: i32) -> Result<(), ModelLoadError> {
        let _lock = self.lock_dir()?;

        let mut manifest = self.read_manifest()?;
        if !manifest.classes.contains(&class_id) {
            return Err(ModelLoadError::ClassifierMissing(class_id));
        }

        let path = self.classifier_path(class_id);
        if path.exists() {
            fs::remove_file(&path)?;
        }

        manifest.classes.retain(|&c| c != class_id);
        manifest.num_classes = manifest.classes.len();
        self.write_manifest(&manifest)?;

        info!(class_id, "class removed from model store");
        Ok(())
    }

    /// Back-compat loader for the old monolithic format:
    /// `num_classes:u32 | dimension:u32 | repeated (class_id:i32 |
    /// weights:[f64; D] | bias:f64)`, all little-endian.
    ///
    /// # Errors
    /// Fails on truncated or inconsistent files.
    pub fn legacy_load(path: &Path) -> Result<SvmModel, ModelLoadError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let num_classes = read_u32(&mut reader)? as usize;
        let dimension = read_u32(&mut reader)? as usize;
        if dimension == 0 {
            return Err(ModelLoadError::ManifestInvalid(
                "legacy model has zero dimension".to_string(),
            ));
        }

        let mut model = SvmModel::new(dimension);
        for _ in 0..num_classes {
            let class_id = read_i32(&mut reader)?;
            let mut weights = Vec::with_capacity(dimension);
            for _ in 0..dimension {
                weights.push(read_f64(&mut reader)?);
            }
            let bias = read_f64(&mut reader)?;
            model
                .insert(BinaryClassifier {
                    class_id,
                    weights,
                    bias,
                })
                .map_err(|e| ModelLoadError::ClassifierInvalid {
                    class_id,
                    reason: e.to_string(),
                })?;
        }

        info!(classes = model.num_classes(), "legacy model loaded");
        Ok(model)
    }

    fn read_manifest(&self) -> Result<Manifest, ModelLoadError> {
        let path = self.manifest_path();
        if !path.is_file() {
            return Err(ModelLoadError::ManifestMissing(path));
        }
        let text = fs::read_to_string(&path)?;
        serde_json::from_str(&text).map_err(|e| ModelLoadError::ManifestInvalid(e.to_string()))
    }

    /// Atomic manifest replacement: write to a temp file, then rename over.
    fn write_manifest(&self, manifest: &Manifest) -> Result<(), ModelLoadError> {
        let text = serde_json::to_string_pretty(manifest)
            .map_err(|e| ModelLoadError::ManifestInvalid(e.to_string()))?;
        let tmp = self.dir.join(format!("{MANIFEST_NAME}.tmp"));
        fs::write(&tmp, text)?;
        fs::rename(&tmp, self.manifest_path())?;
        Ok(())
    }

    fn read_classifier(
        &self,
        class_id: i32,
        dimension: usize,
    ) -> Result<BinaryClassifier, ModelLoadError> {
        let path = self.classifier_path(class_id);
        if !path.is_file() {
            return Err(ModelLoadError::ClassifierMissing(class_id));
        }

        let file = File::open(&path)?;
        let mut reader = BufReader::new(file);

        let file_dimension = read_u32(&mut reader)? as usize;
        if file_dimension != dimension {
            return Err(ModelLoadError::DimensionMismatch {
                class_id,
                expected: dimension,
                actual: file_dimension,
            });
        }

        let mut weights = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            weights.push(read_f64(&mut reader)?);
        }
        let bias = read_f64(&mut reader)?;

        Ok(BinaryClassifier {
            class_id,
            weights,
            bias,
        })
    }

    fn write_classifier(&self, classifier: &BinaryClassifier) -> Result<(), ModelLoadError> {
        let path = self.classifier_path(classifier.class_id);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&(classifier.weights.len() as u32).to_le_bytes())?;
        for weight in &classifier.weights {
            writer.write_all(&weight.to_le_bytes())?;
        }
        writer.write_all(&classifier.bias.to_le_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

fn parse_classifier_name(name: &str) -> Option<i32> {
    name.strip_prefix("class_")?
        .strip_suffix(".bin")?
        .parse()
        .ok()
}

fn read_u32(reader: &mut impl Read) -> Result<u32, ModelLoadError> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_i32(reader: &mut impl Read) -> Result<i32, ModelLoadError> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

fn read_f64(reader: &mut impl Read) -> Result<f64, ModelLoadError> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(f64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn classifier(class_id: i32, dimension: usize) -> BinaryClassifier {
        BinaryClassifier {
            class_id,
            weights: (0..dimension).map(|i| i as f64 * 0.25 - 1.0).collect(),
            bias: 0.5 + f64::from(class_id),
        }
    }

    fn model_with(classes: &[i32], dimension: usize) -> SvmModel {
        let mut model = SvmModel::new(dimension);
        for &class_id in classes {
            model.insert(classifier(class_id, dimension)).unwrap();
        }
        model
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();

        let model = model_with(&[1, 2, 5], 8);
        store.save_full(&model).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn test_classifier_file_size() {
        // u32 dim + D f64 weights + f64 bias = 12 + 8D bytes
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        store.save_full(&model_with(&[3], 250)).unwrap();

        let len = fs::metadata(store.classifier_path(3)).unwrap().len();
        assert_eq!(len, 12 + 8 * 250);
    }

    #[test]
    fn test_add_class_updates_manifest_and_files() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        store.save_full(&model_with(&[1, 2], 4)).unwrap();

        store.add_class(&classifier(3, 4)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.classes(), vec![1, 2, 3]);
        assert!(store.classifier_path(3).is_file());
    }

    #[test]
    fn test_add_class_does_not_touch_existing_files() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        store.save_full(&model_with(&[1, 2], 4)).unwrap();

        let before_1 = fs::read(store.classifier_path(1)).unwrap();
        let before_2 = fs::read(store.classifier_path(2)).unwrap();

        store.add_class(&classifier(3, 4)).unwrap();

        assert_eq!(fs::read(store.classifier_path(1)).unwrap(), before_1);
        assert_eq!(fs::read(store.classifier_path(2)).unwrap(), before_2);
    }

    #[test]
    fn test_remove_class() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        store.save_full(&model_with(&[1, 2, 3], 4)).unwrap();

        store.remove_class(2).unwrap();

        assert!(!store.classifier_path(2).exists());
        let loaded = store.load().unwrap();
        assert_eq!(loaded.classes(), vec![1, 3]);
    }

    #[test]
    fn test_remove_unknown_class_fails() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        store.save_full(&model_with(&[1], 4)).unwrap();
        assert!(matches!(
            store.remove_class(9),
            Err(ModelLoadError::ClassifierMissing(9))
        ));
    }

    #[test]
    fn test_load_detects_missing_classifier_file() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        store.save_full(&model_with(&[1, 2], 4)).unwrap();

        fs::remove_file(store.classifier_path(2)).unwrap();

        assert!(matches!(
            store.load(),
            Err(ModelLoadError::ClassifierMissing(2))
        ));
    }

    #[test]
    fn test_load_detects_stray_classifier_file() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        store.save_full(&model_with(&[1], 4)).unwrap();

        // A class file the manifest knows nothing about
        let stray = classifier(7, 4);
        store.write_classifier(&stray).unwrap();

        assert!(matches!(
            store.load(),
            Err(ModelLoadError::StrayClassifier(_))
        ));
    }

    #[test]
    fn test_load_detects_dimension_mismatch() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        store.save_full(&model_with(&[1], 4)).unwrap();

        // Overwrite class 1 with a different dimension
        store.write_classifier(&classifier(1, 6)).unwrap();

        assert!(matches!(
            store.load(),
            Err(ModelLoadError::DimensionMismatch { class_id: 1, .. })
        ));
    }

    #[test]
    fn test_missing_manifest_reports_model_not_loaded() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load(),
            Err(ModelLoadError::ManifestMissing(_))
        ));
    }

    #[test]
    fn test_legacy_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modelo_svm.bin");

        // Hand-build the monolithic format
        let model = model_with(&[4, 9], 3);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        for class_id in [4, 9] {
            let clf = model.classifier(class_id).unwrap();
            bytes.extend_from_slice(&class_id.to_le_bytes());
            for w in &clf.weights {
                bytes.extend_from_slice(&w.to_le_bytes());
            }
            bytes.extend_from_slice(&clf.bias.to_le_bytes());
        }
        fs::write(&path, bytes).unwrap();

        let loaded = ModelStore::legacy_load(&path).unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn test_legacy_load_truncated_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modelo_svm.bin");
        fs::write(&path, [1, 0, 0, 0, 3, 0]).unwrap();
        assert!(ModelStore::legacy_load(&path).is_err());
    }
}
