//! Trainer and model-store integration properties

mod common;

use common::fast_config;
use voice_biometric_common::Deadline;
use voice_biometric_dataset::Dataset;
use voice_biometric_model_store::ModelStore;
use voice_biometric_svm::{train_incremental, train_one_vs_all};

/// Dataset whose classes sit on separate axes, trivially separable.
fn axis_dataset(classes: &[i32], per_class: usize, dim: usize) -> Dataset {
    let mut ds = Dataset::default();
    for (axis, &class) in classes.iter().enumerate() {
        for i in 0..per_class {
            let mut v = vec![0.05; dim];
            v[axis] = 1.0 + 0.01 * i as f64;
            ds.push(v, class);
        }
    }
    ds
}

/// Two classes separable on coordinate 0 only.
fn coordinate_zero_dataset(per_class: usize) -> Dataset {
    let mut ds = Dataset::default();
    for i in 0..per_class {
        ds.push(vec![1.0 + 0.01 * i as f64, 0.2, 0.2, 0.2], 1);
        ds.push(vec![-1.0 - 0.01 * i as f64, 0.2, 0.2, 0.2], 2);
    }
    ds
}

#[test]
fn separable_two_class_dataset_trains_to_high_accuracy() {
    // 20 samples per class, separable on coordinate 0: training accuracy
    // must reach 99% and the biases must stay bounded.
    let ds = coordinate_zero_dataset(20);
    let config = fast_config();
    let report = train_one_vs_all(&ds, &config.svm, &Deadline::none()).unwrap();

    let mut correct = 0;
    for (features, &label) in ds.features.iter().zip(&ds.labels) {
        if report.model.predict(features).unwrap() == label {
            correct += 1;
        }
    }
    assert!(correct as f64 / ds.len() as f64 >= 0.99);

    for classifier in report.model.classifiers() {
        assert!(classifier.bias.abs() < 5.0);
    }
}

#[test]
fn training_with_fixed_seed_is_bit_identical() {
    let ds = axis_dataset(&[1, 2, 3], 10, 4);
    let config = fast_config();

    let a = train_one_vs_all(&ds, &config.svm, &Deadline::none()).unwrap();
    let b = train_one_vs_all(&ds, &config.svm, &Deadline::none()).unwrap();

    for class_id in a.model.classes() {
        let ca = a.model.classifier(class_id).unwrap();
        let cb = b.model.classifier(class_id).unwrap();
        for (wa, wb) in ca.weights.iter().zip(&cb.weights) {
            assert_eq!(wa.to_bits(), wb.to_bits());
        }
        assert_eq!(ca.bias.to_bits(), cb.bias.to_bits());
    }
}

#[test]
fn incremental_add_leaves_existing_classifiers_byte_identical() {
    // Train on {1,2,3}, commit, record the on-disk classifiers, then add
    // class 4 incrementally: classes 1-3 must be byte-for-byte untouched.
    let tmp = tempfile::tempdir().unwrap();
    let store = ModelStore::open(tmp.path()).unwrap();
    let config = fast_config();

    let base = axis_dataset(&[1, 2, 3], 10, 5);
    let report = train_one_vs_all(&base, &config.svm, &Deadline::none()).unwrap();
    store.save_full(&report.model).unwrap();

    let recorded: Vec<(i32, Vec<u8>)> = [1, 2, 3]
        .iter()
        .map(|&id| (id, std::fs::read(store.classifier_path(id)).unwrap()))
        .collect();

    let full = axis_dataset(&[1, 2, 3, 4], 10, 5);
    let model = store.load().unwrap();
    let trained = train_incremental(&model, &full, 4, &config.svm, &Deadline::none()).unwrap();
    store.add_class(&trained.classifier).unwrap();

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.classes(), vec![1, 2, 3, 4]);

    for (id, bytes_before) in recorded {
        let bytes_after = std::fs::read(store.classifier_path(id)).unwrap();
        assert_eq!(bytes_after, bytes_before, "class {id} was touched");
    }
}

#[test]
fn classifier_round_trips_through_store_exactly() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ModelStore::open(tmp.path()).unwrap();
    let config = fast_config();

    let ds = axis_dataset(&[1, 2], 10, 6);
    let report = train_one_vs_all(&ds, &config.svm, &Deadline::none()).unwrap();
    store.save_full(&report.model).unwrap();

    let loaded = store.load().unwrap();
    for class_id in report.model.classes() {
        let original = report.model.classifier(class_id).unwrap();
        let restored = loaded.classifier(class_id).unwrap();
        for (a, b) in original.weights.iter().zip(&restored.weights) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(original.bias.to_bits(), restored.bias.to_bits());
    }
}

#[test]
fn manifest_stays_consistent_across_mutations() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ModelStore::open(tmp.path()).unwrap();
    let config = fast_config();

    let ds = axis_dataset(&[1, 2, 3], 10, 4);
    let report = train_one_vs_all(&ds, &config.svm, &Deadline::none()).unwrap();
    store.save_full(&report.model).unwrap();

    store.remove_class(2).unwrap();

    // Manifest classes must equal the class files on disk
    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.manifest_path()).unwrap()).unwrap();
    let manifest_classes: Vec<i64> = manifest["classes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect();
    assert_eq!(manifest_classes, vec![1, 3]);
    assert_eq!(manifest["num_classes"], 2);
    assert!(store.classifier_path(1).is_file());
    assert!(!store.classifier_path(2).exists());
    assert!(store.classifier_path(3).is_file());

    // And the store must still load cleanly
    assert_eq!(store.load().unwrap().classes(), vec![1, 3]);
}
