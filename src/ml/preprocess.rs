//! Feature preprocessing - standard scaling plus flag indicator encoding
//!
//! `fit` learns per-column mean/scale for the numeric block and the
//! observed flag vocabulary; `transform` reproduces the training-time
//! transformation bit-for-bit at serving time. The one-hot encoding of
//! `flag` is narrowed to a single retained indicator column (the feature is
//! effectively binary in practice); narrowing is vocabulary-driven so a
//! flag never seen during `fit` degrades to a zero indicator, never an
//! error.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::schema::{FeatureRecord, CATEGORICAL_FEATURES, NUMERIC_FEATURES};

/// Indicator category preferred by the narrowing step when present in the
/// fitted vocabulary.
const PREFERRED_INDICATOR: &str = "SF";

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("preprocessor has not been fitted yet")]
    NotFitted,

    #[error("cannot fit preprocessor on an empty record set")]
    EmptyFitSet,
}

/// Parameters learned by `fit`. Immutable once created; a refit replaces
/// the whole set rather than amending it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedParams {
    /// Numeric feature names in output column order
    pub numeric_features: Vec<String>,
    /// Categorical feature names
    pub categorical_features: Vec<String>,
    /// Per-numeric-column mean from the fit set
    pub mean: Vec<f64>,
    /// Per-numeric-column scale (population standard deviation; 1.0 for
    /// zero-variance columns so transform stays finite)
    pub scale: Vec<f64>,
    /// Sorted distinct flag values observed during fit
    pub flag_vocabulary: Vec<String>,
    /// The single one-hot column retained by the narrowing step
    pub indicator_category: String,
}

/// Fit/transform pipeline over [`FeatureRecord`] tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preprocessor {
    fitted: Option<FittedParams>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self { fitted: None }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn fitted_params(&self) -> Result<&FittedParams, PreprocessError> {
        self.fitted.as_ref().ok_or(PreprocessError::NotFitted)
    }

    /// Fit scaling and encoding parameters on a training table.
    ///
    /// Refitting replaces all derived parameters.
    pub fn fit(&mut self, records: &[FeatureRecord]) -> Result<(), PreprocessError> {
        if records.is_empty() {
            return Err(PreprocessError::EmptyFitSet);
        }

        let n = records.len() as f64;
        let width = NUMERIC_FEATURES.len();
        let mut mean = vec![0.0; width];
        for record in records {
            for (j, value) in record.numeric_values().into_iter().enumerate() {
                mean[j] += value;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut scale = vec![0.0; width];
        for record in records {
            for (j, value) in record.numeric_values().into_iter().enumerate() {
                let d = value - mean[j];
                scale[j] += d * d;
            }
        }
        for s in scale.iter_mut() {
            *s = (*s / n).sqrt();
            // Constant columns scale to 1.0 so transform stays finite
            if *s == 0.0 {
                *s = 1.0;
            }
        }

        let mut flag_vocabulary: Vec<String> =
            records.iter().map(|r| r.flag.clone()).collect();
        flag_vocabulary.sort();
        flag_vocabulary.dedup();

        // Indicator narrowing: the generic one-hot block is reduced to the
        // single column for the retained category.
        let indicator_category = if flag_vocabulary.iter().any(|f| f == PREFERRED_INDICATOR) {
            PREFERRED_INDICATOR.to_string()
        } else {
            // Vocabulary is non-empty here
            flag_vocabulary.last().cloned().unwrap_or_default()
        };

        tracing::info!(
            numeric = width,
            vocabulary = flag_vocabulary.len(),
            indicator = %indicator_category,
            "fitted preprocessor"
        );

        self.fitted = Some(FittedParams {
            numeric_features: NUMERIC_FEATURES.iter().map(|f| f.to_string()).collect(),
            categorical_features: CATEGORICAL_FEATURES.iter().map(|f| f.to_string()).collect(),
            mean,
            scale,
            flag_vocabulary,
            indicator_category,
        });

        Ok(())
    }

    /// Transform records into a numeric matrix using the fitted parameters.
    ///
    /// Output has `numeric_features.len() + 1` columns: the scaled numeric
    /// block in declared order followed by the retained flag indicator.
    /// Deterministic and side-effect free.
    pub fn transform(&self, records: &[FeatureRecord]) -> Result<Array2<f64>, PreprocessError> {
        let params = self.fitted_params()?;
        let width = params.numeric_features.len() + 1;

        let mut data = Vec::with_capacity(records.len() * width);
        for record in records {
            for (j, value) in record.numeric_values().into_iter().enumerate() {
                data.push((value - params.mean[j]) / params.scale[j]);
            }
            // Unknown categories one-hot to all zeros, so the retained
            // indicator is simply an equality check
            let indicator = if record.flag == params.indicator_category {
                1.0
            } else {
                0.0
            };
            data.push(indicator);
        }

        Ok(Array2::from_shape_vec((records.len(), width), data)
            .expect("row width is constant by construction"))
    }

    /// Fit and transform in one step; exactly `fit` followed by `transform`.
    pub fn fit_transform(
        &mut self,
        records: &[FeatureRecord],
    ) -> Result<Array2<f64>, PreprocessError> {
        self.fit(records)?;
        self.transform(records)
    }

    /// Output column names: numeric features then `flag_<indicator>`.
    pub fn feature_names(&self) -> Result<Vec<String>, PreprocessError> {
        let params = self.fitted_params()?;
        let mut names = params.numeric_features.clone();
        names.push(format!("flag_{}", params.indicator_category));
        Ok(names)
    }

    /// Number of output columns after transform.
    pub fn output_width(&self) -> Result<usize, PreprocessError> {
        Ok(self.fitted_params()?.numeric_features.len() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(serror: f64, count: i64, flag: &str) -> FeatureRecord {
        FeatureRecord {
            logged_in: false,
            count,
            serror_rate: serror,
            srv_serror_rate: serror,
            same_srv_rate: 0.5,
            dst_host_srv_count: 10,
            dst_host_same_srv_rate: 0.5,
            dst_host_serror_rate: serror,
            dst_host_srv_serror_rate: serror,
            flag: flag.to_string(),
        }
    }

    fn fit_set() -> Vec<FeatureRecord> {
        vec![
            record(0.0, 10, "SF"),
            record(0.2, 20, "S0"),
            record(0.4, 30, "SF"),
            record(0.8, 40, "S0"),
        ]
    }

    #[test]
    fn transform_before_fit_fails() {
        let pre = Preprocessor::new();
        assert!(matches!(
            pre.transform(&fit_set()),
            Err(PreprocessError::NotFitted)
        ));
    }

    #[test]
    fn fit_on_empty_set_fails() {
        let mut pre = Preprocessor::new();
        assert!(matches!(pre.fit(&[]), Err(PreprocessError::EmptyFitSet)));
    }

    #[test]
    fn output_has_numeric_plus_one_columns() {
        let mut pre = Preprocessor::new();
        let matrix = pre.fit_transform(&fit_set()).unwrap();
        assert_eq!(matrix.ncols(), NUMERIC_FEATURES.len() + 1);
        assert_eq!(matrix.nrows(), 4);
    }

    #[test]
    fn scaling_uses_fit_time_mean_and_std() {
        let mut pre = Preprocessor::new();
        let records = fit_set();
        let matrix = pre.fit_transform(&records).unwrap();

        // count column (index 1): values 10,20,30,40 -> mean 25, std sqrt(125)
        let std = 125.0_f64.sqrt();
        assert!((matrix[[0, 1]] - (10.0 - 25.0) / std).abs() < 1e-12);
        assert!((matrix[[3, 1]] - (40.0 - 25.0) / std).abs() < 1e-12);

        // Scaled columns have zero mean over the fit set
        let col_sum: f64 = (0..4).map(|i| matrix[[i, 1]]).sum();
        assert!(col_sum.abs() < 1e-12);
    }

    #[test]
    fn zero_variance_column_scales_by_one() {
        let mut pre = Preprocessor::new();
        pre.fit(&fit_set()).unwrap();
        // same_srv_rate is constant 0.5 across the fit set
        let params = pre.fitted_params().unwrap();
        assert_eq!(params.scale[4], 1.0);
        let matrix = pre.transform(&fit_set()).unwrap();
        assert_eq!(matrix[[0, 4]], 0.0);
    }

    #[test]
    fn indicator_prefers_sf_category() {
        let mut pre = Preprocessor::new();
        pre.fit(&fit_set()).unwrap();
        let params = pre.fitted_params().unwrap();
        assert_eq!(params.indicator_category, "SF");
        assert_eq!(params.flag_vocabulary, vec!["S0", "SF"]);

        let matrix = pre.transform(&fit_set()).unwrap();
        let indicator = NUMERIC_FEATURES.len();
        assert_eq!(matrix[[0, indicator]], 1.0); // SF
        assert_eq!(matrix[[1, indicator]], 0.0); // S0
    }

    #[test]
    fn indicator_falls_back_when_sf_unseen() {
        let mut pre = Preprocessor::new();
        pre.fit(&[record(0.1, 5, "S0"), record(0.2, 6, "REJ")]).unwrap();
        assert_eq!(pre.fitted_params().unwrap().indicator_category, "S0");
    }

    #[test]
    fn unknown_category_transforms_to_zero_indicator() {
        let mut pre = Preprocessor::new();
        pre.fit(&fit_set()).unwrap();

        let unseen = record(0.3, 15, "RSTO");
        let matrix = pre.transform(std::slice::from_ref(&unseen)).unwrap();
        assert_eq!(matrix[[0, NUMERIC_FEATURES.len()]], 0.0);
    }

    #[test]
    fn transform_is_idempotent() {
        let mut pre = Preprocessor::new();
        pre.fit(&fit_set()).unwrap();
        let a = pre.transform(&fit_set()).unwrap();
        let b = pre.transform(&fit_set()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fit_transform_equals_fit_then_transform() {
        let records = fit_set();
        let mut first = Preprocessor::new();
        let combined = first.fit_transform(&records).unwrap();

        let mut second = Preprocessor::new();
        second.fit(&records).unwrap();
        let separate = second.transform(&records).unwrap();

        assert_eq!(combined, separate);
    }

    #[test]
    fn refit_replaces_parameters() {
        let mut pre = Preprocessor::new();
        pre.fit(&fit_set()).unwrap();
        let before = pre.fitted_params().unwrap().clone();

        pre.fit(&[record(1.0, 100, "REJ"), record(0.9, 200, "REJ")]).unwrap();
        let after = pre.fitted_params().unwrap();
        assert_ne!(&before, after);
        assert_eq!(after.flag_vocabulary, vec!["REJ"]);
    }

    #[test]
    fn feature_names_end_with_indicator() {
        let mut pre = Preprocessor::new();
        pre.fit(&fit_set()).unwrap();
        let names = pre.feature_names().unwrap();
        assert_eq!(names.len(), NUMERIC_FEATURES.len() + 1);
        assert_eq!(names.last().unwrap(), "flag_SF");
    }

    #[test]
    fn serialization_round_trips_fitted_state() {
        let mut pre = Preprocessor::new();
        pre.fit(&fit_set()).unwrap();
        let json = serde_json::to_string(&pre).unwrap();
        let restored: Preprocessor = serde_json::from_str(&json).unwrap();

        // The count column's scale is sqrt(125), not exactly
        // representable in decimal; reloaded parameters must still be
        // bit-identical so serving matrices match training matrices.
        assert_eq!(
            pre.fitted_params().unwrap(),
            restored.fitted_params().unwrap()
        );
        assert_eq!(
            pre.transform(&fit_set()).unwrap(),
            restored.transform(&fit_set()).unwrap()
        );
    }
}
