//! Candidate sweep and best-model selection
//!
//! Trains one independent model per registered candidate, evaluates each on
//! the held-out test split (accuracy/precision/recall/F1/ROC-AUC plus
//! 5-fold cross-validated F1 on the training split) and keeps the
//! candidate with the highest test-set F1. A candidate that fails to fit is
//! logged and skipped; the sweep only fails when every candidate does.

use std::collections::BTreeMap;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::classifier::{
    DecisionTreeModel, FitError, GradientBoostingModel, LogisticModel, TrainedClassifier,
};
use super::metrics;

const CV_FOLDS: usize = 5;

#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("no model has been trained yet")]
    NoModelTrained,

    #[error("no models were successfully trained")]
    AllCandidatesFailed,
}

/// Registered candidate algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Logistic,
    DecisionTree,
    GradientBoosting,
}

impl CandidateKind {
    pub fn name(&self) -> &'static str {
        match self {
            CandidateKind::Logistic => "logistic",
            CandidateKind::DecisionTree => "decision_tree",
            CandidateKind::GradientBoosting => "gradient_boosting",
        }
    }

    fn train(&self, x: &Array2<f64>, y: &[u8]) -> Result<TrainedClassifier, FitError> {
        match self {
            CandidateKind::Logistic => LogisticModel::train(x, y).map(TrainedClassifier::Logistic),
            CandidateKind::DecisionTree => {
                DecisionTreeModel::train(x, y).map(TrainedClassifier::DecisionTree)
            }
            CandidateKind::GradientBoosting => {
                GradientBoostingModel::train(x, y).map(TrainedClassifier::GradientBoosting)
            }
        }
    }
}

/// Held-out and cross-validated scores for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
    pub cv_f1_mean: f64,
    pub cv_f1_std: f64,
}

pub struct ModelTrainer {
    random_state: u64,
    candidates: Vec<CandidateKind>,
    best_model: Option<TrainedClassifier>,
    best_model_name: Option<&'static str>,
    best_score: f64,
}

impl ModelTrainer {
    pub fn new(random_state: u64) -> Self {
        Self::with_candidates(
            random_state,
            vec![
                CandidateKind::Logistic,
                CandidateKind::DecisionTree,
                CandidateKind::GradientBoosting,
            ],
        )
    }

    pub fn with_candidates(random_state: u64, candidates: Vec<CandidateKind>) -> Self {
        Self {
            random_state,
            candidates,
            best_model: None,
            best_model_name: None,
            best_score: f64::NEG_INFINITY,
        }
    }

    /// Train and evaluate every candidate, tracking the best by test F1.
    /// Ties keep the first-trained candidate.
    pub fn train_and_evaluate(
        &mut self,
        x_train: &Array2<f64>,
        y_train: &[u8],
        x_test: &Array2<f64>,
        y_test: &[u8],
    ) -> Result<BTreeMap<&'static str, ModelMetrics>, TrainerError> {
        if x_train.ncols() != x_test.ncols() {
            return Err(TrainerError::ShapeMismatch(format!(
                "feature dimension mismatch: train {} != test {}",
                x_train.ncols(),
                x_test.ncols()
            )));
        }
        if y_train.len() != x_train.nrows() {
            return Err(TrainerError::ShapeMismatch(format!(
                "train data length mismatch: X {} != y {}",
                x_train.nrows(),
                y_train.len()
            )));
        }
        if y_test.len() != x_test.nrows() {
            return Err(TrainerError::ShapeMismatch(format!(
                "test data length mismatch: X {} != y {}",
                x_test.nrows(),
                y_test.len()
            )));
        }

        let mut results = BTreeMap::new();

        for candidate in self.candidates.clone() {
            tracing::info!(candidate = candidate.name(), "training candidate");

            let outcome = candidate.train(x_train, y_train).and_then(|model| {
                let cv = self.cross_val_f1(candidate, x_train, y_train)?;
                Ok((model, cv))
            });

            let (model, (cv_mean, cv_std)) = match outcome {
                Ok(v) => v,
                Err(e) => {
                    // One failing candidate never blocks the sweep
                    tracing::warn!(candidate = candidate.name(), error = %e, "candidate failed, skipping");
                    continue;
                }
            };

            let scores = model.predict_proba(x_test);
            let y_pred = model.predict(x_test);
            let metrics = ModelMetrics {
                accuracy: metrics::accuracy(y_test, &y_pred),
                precision: metrics::precision(y_test, &y_pred),
                recall: metrics::recall(y_test, &y_pred),
                f1: metrics::f1_score(y_test, &y_pred),
                roc_auc: metrics::roc_auc(y_test, &scores),
                cv_f1_mean: cv_mean,
                cv_f1_std: cv_std,
            };

            tracing::info!(
                candidate = candidate.name(),
                f1 = metrics.f1,
                roc_auc = metrics.roc_auc,
                cv_f1_mean = metrics.cv_f1_mean,
                "candidate evaluated"
            );

            if metrics.f1 > self.best_score {
                self.best_score = metrics.f1;
                self.best_model = Some(model);
                self.best_model_name = Some(candidate.name());
            }

            results.insert(candidate.name(), metrics);
        }

        if results.is_empty() {
            return Err(TrainerError::AllCandidatesFailed);
        }

        tracing::info!(
            best = self.best_model_name.unwrap_or("none"),
            f1 = self.best_score,
            "best model selected"
        );
        Ok(results)
    }

    /// 5-fold cross-validated F1 on the training split, deterministic
    /// under the trainer's seed.
    fn cross_val_f1(
        &self,
        candidate: CandidateKind,
        x: &Array2<f64>,
        y: &[u8],
    ) -> Result<(f64, f64), FitError> {
        let mut indices: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = StdRng::seed_from_u64(self.random_state);
        indices.shuffle(&mut rng);

        let fold_size = indices.len().div_ceil(CV_FOLDS);
        let mut fold_scores = Vec::with_capacity(CV_FOLDS);

        for fold in indices.chunks(fold_size) {
            let train_idx: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|i| !fold.contains(i))
                .collect();

            let x_fit = x.select(Axis(0), &train_idx);
            let y_fit: Vec<u8> = train_idx.iter().map(|&i| y[i]).collect();
            let x_val = x.select(Axis(0), fold);
            let y_val: Vec<u8> = fold.iter().map(|&i| y[i]).collect();

            let model = candidate.train(&x_fit, &y_fit)?;
            let y_pred = model.predict(&x_val);
            fold_scores.push(metrics::f1_score(&y_val, &y_pred));
        }

        let mean = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        let var = fold_scores
            .iter()
            .map(|s| (s - mean) * (s - mean))
            .sum::<f64>()
            / fold_scores.len() as f64;
        Ok((mean, var.sqrt()))
    }

    pub fn best_model(&self) -> Option<&TrainedClassifier> {
        self.best_model.as_ref()
    }

    pub fn best_model_name(&self) -> Option<&'static str> {
        self.best_model_name
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    /// Consume the trainer, yielding the selected model.
    pub fn into_best_model(self) -> Result<(&'static str, TrainedClassifier), TrainerError> {
        match (self.best_model_name, self.best_model) {
            (Some(name), Some(model)) => Ok((name, model)),
            _ => Err(TrainerError::NoModelTrained),
        }
    }

    /// Predict with the currently-best model.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<u8>, TrainerError> {
        self.best_model
            .as_ref()
            .map(|m| m.predict(x))
            .ok_or(TrainerError::NoModelTrained)
    }

    /// Prediction probabilities from the currently-best model.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>, TrainerError> {
        self.best_model
            .as_ref()
            .map(|m| m.predict_proba(x))
            .ok_or(TrainerError::NoModelTrained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::dataset::generate_labeled_traffic;
    use crate::ml::preprocess::Preprocessor;

    fn prepared_split() -> (Array2<f64>, Vec<u8>, Array2<f64>, Vec<u8>) {
        let (records, labels) = generate_labeled_traffic(200, 7);
        let (train, test) = records.split_at(160);
        let (y_train, y_test) = labels.split_at(160);

        let mut pre = Preprocessor::new();
        pre.fit(train).unwrap();
        (
            pre.transform(train).unwrap(),
            y_train.to_vec(),
            pre.transform(test).unwrap(),
            y_test.to_vec(),
        )
    }

    #[test]
    fn sweep_evaluates_all_candidates() {
        let (x_train, y_train, x_test, y_test) = prepared_split();
        let mut trainer = ModelTrainer::new(42);
        let results = trainer
            .train_and_evaluate(&x_train, &y_train, &x_test, &y_test)
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.contains_key("logistic"));
        assert!(results.contains_key("decision_tree"));
        assert!(results.contains_key("gradient_boosting"));
        assert!(trainer.best_model().is_some());
        assert!(trainer.best_score() > 0.8);
    }

    #[test]
    fn best_model_has_highest_f1() {
        let (x_train, y_train, x_test, y_test) = prepared_split();
        let mut trainer = ModelTrainer::new(42);
        let results = trainer
            .train_and_evaluate(&x_train, &y_train, &x_test, &y_test)
            .unwrap();

        let max_f1 = results.values().map(|m| m.f1).fold(f64::MIN, f64::max);
        assert_eq!(trainer.best_score(), max_f1);
        let best_name = trainer.best_model_name().unwrap();
        assert_eq!(results[best_name].f1, max_f1);
    }

    #[test]
    fn predict_without_training_fails() {
        let trainer = ModelTrainer::new(42);
        let x = Array2::<f64>::zeros((1, 10));
        assert!(matches!(
            trainer.predict(&x),
            Err(TrainerError::NoModelTrained)
        ));
        assert!(matches!(
            trainer.predict_proba(&x),
            Err(TrainerError::NoModelTrained)
        ));
    }

    #[test]
    fn feature_dimension_mismatch_rejected() {
        let mut trainer = ModelTrainer::new(42);
        let x_train = Array2::<f64>::zeros((4, 3));
        let x_test = Array2::<f64>::zeros((2, 5));
        let err = trainer
            .train_and_evaluate(&x_train, &[0, 1, 0, 1], &x_test, &[0, 1])
            .unwrap_err();
        assert!(matches!(err, TrainerError::ShapeMismatch(_)));
    }

    #[test]
    fn all_candidates_failing_is_an_error() {
        // A single-class training set makes every candidate fail to fit
        let x_train = Array2::<f64>::zeros((8, 2));
        let y_train = vec![1; 8];
        let x_test = Array2::<f64>::zeros((2, 2));
        let y_test = vec![1, 1];

        let mut trainer = ModelTrainer::new(42);
        let err = trainer
            .train_and_evaluate(&x_train, &y_train, &x_test, &y_test)
            .unwrap_err();
        assert!(matches!(err, TrainerError::AllCandidatesFailed));
    }

    #[test]
    fn restricted_candidate_list_trains_only_those() {
        let (x_train, y_train, x_test, y_test) = prepared_split();
        let mut trainer =
            ModelTrainer::with_candidates(42, vec![CandidateKind::Logistic]);
        let results = trainer
            .train_and_evaluate(&x_train, &y_train, &x_test, &y_test)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(trainer.best_model_name(), Some("logistic"));
    }

    #[test]
    fn sweep_is_deterministic_under_seed() {
        let (x_train, y_train, x_test, y_test) = prepared_split();
        let mut a = ModelTrainer::new(42);
        let mut b = ModelTrainer::new(42);
        let ra = a.train_and_evaluate(&x_train, &y_train, &x_test, &y_test).unwrap();
        let rb = b.train_and_evaluate(&x_train, &y_train, &x_test, &y_test).unwrap();
        assert_eq!(ra, rb);
        assert_eq!(a.best_model_name(), b.best_model_name());
    }
}
