//! Binary classification metrics
//!
//! Zero-division cases (no predicted positives, no actual positives)
//! evaluate to 0.0; a degenerate ROC-AUC with a single class present is
//! 0.5.

/// Confusion counts for binary labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl Confusion {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        debug_assert_eq!(y_true.len(), y_pred.len());
        let mut c = Confusion::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (1, 1) => c.tp += 1,
                (0, 1) => c.fp += 1,
                (0, 0) => c.tn += 1,
                _ => c.fn_ += 1,
            }
        }
        c
    }
}

pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

pub fn precision(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let c = Confusion::from_labels(y_true, y_pred);
    let predicted_positive = c.tp + c.fp;
    if predicted_positive == 0 {
        0.0
    } else {
        c.tp as f64 / predicted_positive as f64
    }
}

pub fn recall(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let c = Confusion::from_labels(y_true, y_pred);
    let actual_positive = c.tp + c.fn_;
    if actual_positive == 0 {
        0.0
    } else {
        c.tp as f64 / actual_positive as f64
    }
}

pub fn f1_score(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let p = precision(y_true, y_pred);
    let r = recall(y_true, y_pred);
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

/// Area under the ROC curve from scores, computed rank-based
/// (Mann-Whitney U) with average ranks for tied scores.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> f64 {
    debug_assert_eq!(y_true.len(), scores.len());
    let n_pos = y_true.iter().filter(|&&t| t == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(std::cmp::Ordering::Equal));

    // Assign average ranks across tie groups
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum_pos: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(&t, _)| t == 1)
        .map(|(_, &r)| r)
        .sum();

    let u = rank_sum_pos - n_pos as f64 * (n_pos as f64 + 1.0) / 2.0;
    u / (n_pos as f64 * n_neg as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusion_counts() {
        let y_true = [1, 1, 0, 0, 1];
        let y_pred = [1, 0, 0, 1, 1];
        let c = Confusion::from_labels(&y_true, &y_pred);
        assert_eq!(c, Confusion { tp: 2, fp: 1, tn: 1, fn_: 1 });
    }

    #[test]
    fn known_metric_values() {
        let y_true = [1, 1, 0, 0, 1];
        let y_pred = [1, 0, 0, 1, 1];
        assert!((accuracy(&y_true, &y_pred) - 0.6).abs() < 1e-12);
        assert!((precision(&y_true, &y_pred) - 2.0 / 3.0).abs() < 1e-12);
        assert!((recall(&y_true, &y_pred) - 2.0 / 3.0).abs() < 1e-12);
        assert!((f1_score(&y_true, &y_pred) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_division_is_zero() {
        assert_eq!(precision(&[0, 0], &[0, 0]), 0.0);
        assert_eq!(recall(&[0, 0], &[0, 0]), 0.0);
        assert_eq!(f1_score(&[0, 0], &[0, 0]), 0.0);
    }

    #[test]
    fn perfect_separation_gives_auc_one() {
        let y_true = [0, 0, 1, 1];
        let scores = [0.1, 0.2, 0.8, 0.9];
        assert!((roc_auc(&y_true, &scores) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverted_scores_give_auc_zero() {
        let y_true = [0, 0, 1, 1];
        let scores = [0.9, 0.8, 0.2, 0.1];
        assert!(roc_auc(&y_true, &scores).abs() < 1e-12);
    }

    #[test]
    fn tied_scores_use_average_ranks() {
        let y_true = [0, 1];
        let scores = [0.5, 0.5];
        assert!((roc_auc(&y_true, &scores) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn single_class_auc_is_half() {
        assert_eq!(roc_auc(&[1, 1], &[0.3, 0.9]), 0.5);
    }
}
