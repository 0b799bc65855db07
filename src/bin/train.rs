//! Offline training binary.
//!
//! Fits the preprocessing pipeline and the candidate classifiers on
//! labeled traffic, selects the best candidate by F1, and writes the
//! serving artifacts (primary and backup copies) to the configured
//! paths. Run this before starting the server.

use anyhow::Context;
use serde_json::json;

use intrusion_detector::config::Config;
use intrusion_detector::ml::dataset::generate_labeled_traffic;
use intrusion_detector::ml::{ArtifactStore, ModelTrainer, Preprocessor};

const TRAINING_SAMPLES: usize = 2000;
const RANDOM_STATE: u64 = 42;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intrusion_detector=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing::info!(samples = TRAINING_SAMPLES, "generating labeled traffic");
    let (records, labels) = generate_labeled_traffic(TRAINING_SAMPLES, RANDOM_STATE);

    // 80/20 split; the generator already shuffles.
    let split = (records.len() * 4) / 5;
    let (train_records, test_records) = records.split_at(split);
    let (y_train, y_test) = labels.split_at(split);

    let mut preprocessor = Preprocessor::new();
    let x_train = preprocessor
        .fit_transform(train_records)
        .context("failed to fit preprocessor")?;
    let x_test = preprocessor
        .transform(test_records)
        .context("failed to transform test split")?;

    let mut trainer = ModelTrainer::new(RANDOM_STATE);
    let results = trainer
        .train_and_evaluate(&x_train, y_train, &x_test, y_test)
        .context("training failed")?;

    for (name, metrics) in &results {
        tracing::info!(
            "{}: accuracy={:.4} precision={:.4} recall={:.4} f1={:.4} roc_auc={:.4} cv_f1={:.4}±{:.4}",
            name,
            metrics.accuracy,
            metrics.precision,
            metrics.recall,
            metrics.f1,
            metrics.roc_auc,
            metrics.cv_f1_mean,
            metrics.cv_f1_std
        );
    }

    let best_score = trainer.best_score();
    let (best_name, best_model) = trainer
        .into_best_model()
        .context("no candidate produced a model")?;
    tracing::info!("Selected best model: {} (f1={:.4})", best_name, best_score);

    ArtifactStore::save(&preprocessor, &config.preprocessor_path)?;
    ArtifactStore::save(&preprocessor, &config.preprocessor_backup_path)?;
    ArtifactStore::save(&best_model, &config.model_path)?;
    ArtifactStore::save(&best_model, &config.model_backup_path)?;

    let metadata = json!({
        "model_name": config.model_name,
        "model_version": config.model_version,
        "selected_model": best_name,
        "test_f1": best_score,
        "training_samples": TRAINING_SAMPLES,
        "random_state": RANDOM_STATE,
        "trained_at": chrono::Utc::now().to_rfc3339(),
        "metrics": results,
    });
    ArtifactStore::save(&metadata, "artifacts/model_metadata.json")?;

    tracing::info!(
        model_path = %config.model_path,
        preprocessor_path = %config.preprocessor_path,
        "artifacts written"
    );
    Ok(())
}
