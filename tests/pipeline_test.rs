//! End-to-end pipeline tests: synthetic training data through
//! preprocessing, model selection, persistence, and inference.

use intrusion_detector::ml::dataset::generate_labeled_traffic;
use intrusion_detector::ml::{ArtifactStore, ModelTrainer, Preprocessor, TrainedClassifier};
use intrusion_detector::ml::artifacts::FileSource;
use intrusion_detector::ml::schema::FeatureRecord;

fn record(json: serde_json::Value) -> FeatureRecord {
    serde_json::from_value(json).unwrap()
}

/// Unambiguous benign traffic: logged in, low error rates, high
/// same-service ratios.
fn benign_record() -> FeatureRecord {
    record(serde_json::json!({
        "logged_in": true,
        "count": 45,
        "serror_rate": 0.05,
        "srv_serror_rate": 0.04,
        "same_srv_rate": 0.88,
        "dst_host_srv_count": 110,
        "dst_host_same_srv_rate": 0.99,
        "dst_host_serror_rate": 0.02,
        "dst_host_srv_serror_rate": 0.01,
        "flag": "S0"
    }))
}

/// SYN-flood shaped traffic: not logged in, saturated error rates,
/// scattered services.
fn attack_record() -> FeatureRecord {
    record(serde_json::json!({
        "logged_in": false,
        "count": 100,
        "serror_rate": 0.8,
        "srv_serror_rate": 0.9,
        "same_srv_rate": 0.1,
        "dst_host_srv_count": 5,
        "dst_host_same_srv_rate": 0.1,
        "dst_host_serror_rate": 0.9,
        "dst_host_srv_serror_rate": 0.8,
        "flag": "SF"
    }))
}

fn train_pipeline() -> (Preprocessor, TrainedClassifier) {
    let (records, labels) = generate_labeled_traffic(1000, 42);
    let split = (records.len() * 4) / 5;
    let (train_records, test_records) = records.split_at(split);
    let (y_train, y_test) = labels.split_at(split);

    let mut preprocessor = Preprocessor::new();
    let x_train = preprocessor.fit_transform(train_records).unwrap();
    let x_test = preprocessor.transform(test_records).unwrap();

    let mut trainer = ModelTrainer::new(42);
    trainer
        .train_and_evaluate(&x_train, y_train, &x_test, y_test)
        .unwrap();
    let (_, classifier) = trainer.into_best_model().unwrap();
    (preprocessor, classifier)
}

#[test]
fn trained_pipeline_separates_benign_from_attack() {
    let (preprocessor, classifier) = train_pipeline();

    let benign = preprocessor
        .transform(std::slice::from_ref(&benign_record()))
        .unwrap();
    let attack = preprocessor
        .transform(std::slice::from_ref(&attack_record()))
        .unwrap();

    assert_eq!(classifier.predict(&benign)[0], 0, "benign traffic misclassified");
    assert_eq!(classifier.predict(&attack)[0], 1, "attack traffic misclassified");
}

#[test]
fn model_selection_reports_every_surviving_candidate() {
    let (records, labels) = generate_labeled_traffic(400, 3);
    let split = 320;
    let mut preprocessor = Preprocessor::new();
    let x_train = preprocessor.fit_transform(&records[..split]).unwrap();
    let x_test = preprocessor.transform(&records[split..]).unwrap();

    let mut trainer = ModelTrainer::new(3);
    let results = trainer
        .train_and_evaluate(&x_train, &labels[..split], &x_test, &labels[split..])
        .unwrap();

    assert_eq!(results.len(), 3);
    for metrics in results.values() {
        assert!(metrics.f1 > 0.8, "candidate f1 too low: {}", metrics.f1);
        assert!(metrics.roc_auc > 0.8);
    }
    assert!(trainer.best_model().is_some());
}

#[tokio::test]
async fn persisted_pipeline_predicts_identically_after_reload() {
    let (preprocessor, classifier) = train_pipeline();

    let dir = tempfile::tempdir().unwrap();
    let preprocessor_path = dir.path().join("preprocessor.json");
    let model_path = dir.path().join("model.json");
    ArtifactStore::save(&preprocessor, &preprocessor_path).unwrap();
    ArtifactStore::save(&classifier, &model_path).unwrap();

    let loaded_preprocessor: Preprocessor =
        ArtifactStore::new(vec![Box::new(FileSource::new(&preprocessor_path))])
            .load()
            .await
            .unwrap();
    let loaded_classifier: TrainedClassifier =
        ArtifactStore::new(vec![Box::new(FileSource::new(&model_path))])
            .load()
            .await
            .unwrap();

    let (probe_records, _) = generate_labeled_traffic(50, 9);
    let before = preprocessor.transform(&probe_records).unwrap();
    let after = loaded_preprocessor.transform(&probe_records).unwrap();
    assert_eq!(before, after);
    assert_eq!(
        classifier.predict_proba(&before),
        loaded_classifier.predict_proba(&after)
    );
}

#[test]
fn transform_width_matches_training_width() {
    let (preprocessor, classifier) = train_pipeline();
    let matrix = preprocessor
        .transform(std::slice::from_ref(&benign_record()))
        .unwrap();
    assert_eq!(matrix.ncols(), preprocessor.output_width().unwrap());

    // A single-row transform must be accepted by the trained model.
    assert_eq!(classifier.predict(&matrix).len(), 1);
}
