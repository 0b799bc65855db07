//! Trainable binary classifiers
//!
//! Three candidate families, all tolerant of class imbalance through
//! inverse-class-frequency sample weights: a logistic model fit by
//! gradient descent, a gini decision tree, and gradient-boosted depth-1
//! regression trees on logistic loss. Training is deterministic; fitted
//! models are immutable, serde-serializable artifacts.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("training labels contain a single class; need both 0 and 1")]
    SingleClass,

    #[error("label length {labels} does not match {rows} training rows")]
    LabelMismatch { labels: usize, rows: usize },
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Inverse-class-frequency sample weights, n / (2 * n_class), so each
/// class contributes equally regardless of imbalance.
fn balanced_weights(y: &[u8]) -> Result<Vec<f64>, FitError> {
    let n_pos = y.iter().filter(|&&t| t == 1).count();
    let n_neg = y.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(FitError::SingleClass);
    }
    let n = y.len() as f64;
    let w_pos = n / (2.0 * n_pos as f64);
    let w_neg = n / (2.0 * n_neg as f64);
    Ok(y.iter()
        .map(|&t| if t == 1 { w_pos } else { w_neg })
        .collect())
}

fn check_shapes(x: &Array2<f64>, y: &[u8]) -> Result<(), FitError> {
    if x.nrows() == 0 {
        return Err(FitError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(FitError::LabelMismatch {
            labels: y.len(),
            rows: x.nrows(),
        });
    }
    Ok(())
}

// ============================================================================
// LOGISTIC REGRESSION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticModel {
    const EPOCHS: usize = 300;
    const LEARNING_RATE: f64 = 0.5;

    /// Fit by full-batch gradient descent on weighted logistic loss.
    pub fn train(x: &Array2<f64>, y: &[u8]) -> Result<Self, FitError> {
        check_shapes(x, y)?;
        let sample_weights = balanced_weights(y)?;
        let weight_sum: f64 = sample_weights.iter().sum();

        let cols = x.ncols();
        let mut weights = vec![0.0; cols];
        let mut bias = 0.0;

        for _ in 0..Self::EPOCHS {
            let mut grad_w = vec![0.0; cols];
            let mut grad_b = 0.0;

            for (i, row) in x.rows().into_iter().enumerate() {
                let z: f64 = row
                    .iter()
                    .zip(&weights)
                    .map(|(xi, wi)| xi * wi)
                    .sum::<f64>()
                    + bias;
                let err = sample_weights[i] * (sigmoid(z) - y[i] as f64);
                for (g, xi) in grad_w.iter_mut().zip(row.iter()) {
                    *g += err * xi;
                }
                grad_b += err;
            }

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= Self::LEARNING_RATE * g / weight_sum;
            }
            bias -= Self::LEARNING_RATE * grad_b / weight_sum;
        }

        Ok(Self { weights, bias })
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                let z: f64 = row
                    .iter()
                    .zip(&self.weights)
                    .map(|(xi, wi)| xi * wi)
                    .sum::<f64>()
                    + self.bias;
                sigmoid(z)
            })
            .collect()
    }
}

// ============================================================================
// DECISION TREE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        /// Weighted positive fraction at the leaf
        proba: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeModel {
    pub root: TreeNode,
    pub max_depth: usize,
}

impl DecisionTreeModel {
    const MAX_DEPTH: usize = 8;
    const MIN_SAMPLES_SPLIT: usize = 4;

    pub fn train(x: &Array2<f64>, y: &[u8]) -> Result<Self, FitError> {
        check_shapes(x, y)?;
        let sample_weights = balanced_weights(y)?;
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let root = Self::build_node(x, y, &sample_weights, &indices, 0);
        Ok(Self {
            root,
            max_depth: Self::MAX_DEPTH,
        })
    }

    fn weighted_positive_fraction(y: &[u8], w: &[f64], indices: &[usize]) -> f64 {
        let total: f64 = indices.iter().map(|&i| w[i]).sum();
        if total == 0.0 {
            return 0.0;
        }
        let positive: f64 = indices
            .iter()
            .filter(|&&i| y[i] == 1)
            .map(|&i| w[i])
            .sum();
        positive / total
    }

    fn build_node(
        x: &Array2<f64>,
        y: &[u8],
        w: &[f64],
        indices: &[usize],
        depth: usize,
    ) -> TreeNode {
        let proba = Self::weighted_positive_fraction(y, w, indices);
        if depth >= Self::MAX_DEPTH
            || indices.len() < Self::MIN_SAMPLES_SPLIT
            || proba == 0.0
            || proba == 1.0
        {
            return TreeNode::Leaf { proba };
        }

        match Self::best_split(x, y, w, indices) {
            Some((feature, threshold)) => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .copied()
                    .partition(|&i| x[[i, feature]] <= threshold);
                if left_idx.is_empty() || right_idx.is_empty() {
                    return TreeNode::Leaf { proba };
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left: Box::new(Self::build_node(x, y, w, &left_idx, depth + 1)),
                    right: Box::new(Self::build_node(x, y, w, &right_idx, depth + 1)),
                }
            }
            None => TreeNode::Leaf { proba },
        }
    }

    /// Exhaustive scan for the weighted-gini-minimizing split.
    fn best_split(
        x: &Array2<f64>,
        y: &[u8],
        w: &[f64],
        indices: &[usize],
    ) -> Option<(usize, f64)> {
        let total_w: f64 = indices.iter().map(|&i| w[i]).sum();
        let total_pos: f64 = indices
            .iter()
            .filter(|&&i| y[i] == 1)
            .map(|&i| w[i])
            .sum();

        let gini = |pos: f64, weight: f64| -> f64 {
            if weight == 0.0 {
                return 0.0;
            }
            let p = pos / weight;
            2.0 * p * (1.0 - p)
        };
        let parent_impurity = gini(total_pos, total_w);

        let mut best: Option<(usize, f64)> = None;
        let mut best_gain = 1e-9;

        for feature in 0..x.ncols() {
            let mut sorted: Vec<usize> = indices.to_vec();
            sorted.sort_by(|&a, &b| {
                x[[a, feature]]
                    .partial_cmp(&x[[b, feature]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_w = 0.0;
            let mut left_pos = 0.0;
            for k in 0..sorted.len() - 1 {
                let i = sorted[k];
                left_w += w[i];
                if y[i] == 1 {
                    left_pos += w[i];
                }

                let current = x[[i, feature]];
                let next = x[[sorted[k + 1], feature]];
                if current == next {
                    continue;
                }

                let right_w = total_w - left_w;
                let right_pos = total_pos - left_pos;
                let weighted_child = (left_w / total_w) * gini(left_pos, left_w)
                    + (right_w / total_w) * gini(right_pos, right_w);
                let gain = parent_impurity - weighted_child;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature, (current + next) / 2.0));
                }
            }
        }

        best
    }

    fn proba_one(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { proba } => return *proba,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                let row = row.to_vec();
                self.proba_one(&row)
            })
            .collect()
    }
}

// ============================================================================
// GRADIENT BOOSTING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stump {
    pub feature: usize,
    pub threshold: f64,
    pub left_value: f64,
    pub right_value: f64,
}

impl Stump {
    fn value(&self, row: &[f64]) -> f64 {
        if row[self.feature] <= self.threshold {
            self.left_value
        } else {
            self.right_value
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingModel {
    /// Initial log-odds of the positive class
    pub init_score: f64,
    pub stumps: Vec<Stump>,
    pub learning_rate: f64,
}

impl GradientBoostingModel {
    const ROUNDS: usize = 60;
    const LEARNING_RATE: f64 = 0.2;

    /// Boost depth-1 regression trees on logistic loss with Newton leaf
    /// values.
    pub fn train(x: &Array2<f64>, y: &[u8]) -> Result<Self, FitError> {
        check_shapes(x, y)?;
        let n_pos = y.iter().filter(|&&t| t == 1).count();
        let n_neg = y.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return Err(FitError::SingleClass);
        }

        let init_score = (n_pos as f64 / n_neg as f64).ln();
        let mut scores = vec![init_score; y.len()];
        let mut stumps = Vec::with_capacity(Self::ROUNDS);

        for _ in 0..Self::ROUNDS {
            let residuals: Vec<f64> = scores
                .iter()
                .zip(y)
                .map(|(&s, &t)| t as f64 - sigmoid(s))
                .collect();
            let hessians: Vec<f64> = scores
                .iter()
                .map(|&s| {
                    let p = sigmoid(s);
                    (p * (1.0 - p)).max(1e-12)
                })
                .collect();

            let Some(stump) = Self::fit_stump(x, &residuals, &hessians) else {
                break;
            };

            for (i, row) in x.rows().into_iter().enumerate() {
                let row = row.to_vec();
                scores[i] += Self::LEARNING_RATE * stump.value(&row);
            }
            stumps.push(stump);
        }

        Ok(Self {
            init_score,
            stumps,
            learning_rate: Self::LEARNING_RATE,
        })
    }

    /// Best single split by squared-error reduction on the residuals,
    /// leaf values as Newton steps (sum residual / sum hessian).
    fn fit_stump(x: &Array2<f64>, residuals: &[f64], hessians: &[f64]) -> Option<Stump> {
        let n = residuals.len();
        let total_r: f64 = residuals.iter().sum();
        let total_h: f64 = hessians.iter().sum();

        let mut best: Option<(usize, f64, f64, f64)> = None;
        let mut best_gain = 1e-12;

        for feature in 0..x.ncols() {
            let mut sorted: Vec<usize> = (0..n).collect();
            sorted.sort_by(|&a, &b| {
                x[[a, feature]]
                    .partial_cmp(&x[[b, feature]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_r = 0.0;
            let mut left_h = 0.0;
            for k in 0..n - 1 {
                let i = sorted[k];
                left_r += residuals[i];
                left_h += hessians[i];

                let current = x[[i, feature]];
                let next = x[[sorted[k + 1], feature]];
                if current == next {
                    continue;
                }

                let right_r = total_r - left_r;
                let right_h = total_h - left_h;
                let gain = left_r * left_r / left_h + right_r * right_r / right_h
                    - total_r * total_r / total_h;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((
                        feature,
                        (current + next) / 2.0,
                        left_r / left_h,
                        right_r / right_h,
                    ));
                }
            }
        }

        best.map(|(feature, threshold, left_value, right_value)| Stump {
            feature,
            threshold,
            left_value,
            right_value,
        })
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                let row = row.to_vec();
                let score = self.init_score
                    + self
                        .stumps
                        .iter()
                        .map(|s| self.learning_rate * s.value(&row))
                        .sum::<f64>();
                sigmoid(score)
            })
            .collect()
    }
}

// ============================================================================
// TRAINED CLASSIFIER
// ============================================================================

/// A fitted candidate, serialized as the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedClassifier {
    Logistic(LogisticModel),
    DecisionTree(DecisionTreeModel),
    GradientBoosting(GradientBoostingModel),
}

impl TrainedClassifier {
    pub fn name(&self) -> &'static str {
        match self {
            TrainedClassifier::Logistic(_) => "logistic",
            TrainedClassifier::DecisionTree(_) => "decision_tree",
            TrainedClassifier::GradientBoosting(_) => "gradient_boosting",
        }
    }

    /// Probability of the positive (malicious) class per row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        match self {
            TrainedClassifier::Logistic(m) => m.predict_proba(x),
            TrainedClassifier::DecisionTree(m) => m.predict_proba(x),
            TrainedClassifier::GradientBoosting(m) => m.predict_proba(x),
        }
    }

    /// Hard labels: 1 for malicious, 0 for normal.
    pub fn predict(&self, x: &Array2<f64>) -> Vec<u8> {
        self.predict_proba(x)
            .into_iter()
            .map(|p| u8::from(p >= 0.5))
            .collect()
    }
}
