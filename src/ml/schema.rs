//! Feature schema - canonical input fields, types and valid ranges
//!
//! One [`FeatureRecord`] is a single network-connection observation.
//! Fields are the ten selected KDD-style connection attributes; validation
//! reports the first offending field in declared order and never coerces.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Numeric features in their fixed, declared order. This ordering is the
/// column layout of every preprocessed matrix.
pub const NUMERIC_FEATURES: [&str; 9] = [
    "logged_in",
    "count",
    "serror_rate",
    "srv_serror_rate",
    "same_srv_rate",
    "dst_host_srv_count",
    "dst_host_same_srv_rate",
    "dst_host_serror_rate",
    "dst_host_srv_serror_rate",
];

/// Categorical features (just the TCP status flag).
pub const CATEGORICAL_FEATURES: [&str; 1] = ["flag"];

/// Enumerated set of accepted TCP status flags.
pub const VALID_FLAGS: [&str; 12] = [
    "OTH", "REJ", "RSTO", "RSTOS0", "RSTR", "S0", "S1", "S2", "S3", "SF", "SH", "SHR",
];

/// A single network-connection observation submitted for classification.
///
/// Presence and runtime types are enforced by deserialization; ranges and
/// the flag enumeration by [`FeatureRecord::validate_record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FeatureRecord {
    pub logged_in: bool,

    #[validate(range(min = 0))]
    pub count: i64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub serror_rate: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub srv_serror_rate: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub same_srv_rate: f64,

    #[validate(range(min = 0))]
    pub dst_host_srv_count: i64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub dst_host_same_srv_rate: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub dst_host_serror_rate: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub dst_host_srv_serror_rate: f64,

    pub flag: String,
}

/// A specific validation failure naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationFailure {}

impl FeatureRecord {
    /// Validate ranges and the flag enumeration, reporting the first
    /// offending field in declared order. Pure; no coercion.
    pub fn validate_record(&self) -> Result<(), ValidationFailure> {
        if let Err(errors) = self.validate() {
            let field_errors = errors.field_errors();
            // validator collects into a map; report in declared field order
            for (field, message) in [
                ("count", "count must be non-negative"),
                ("serror_rate", "serror_rate must be between 0 and 1"),
                ("srv_serror_rate", "srv_serror_rate must be between 0 and 1"),
                ("same_srv_rate", "same_srv_rate must be between 0 and 1"),
                ("dst_host_srv_count", "dst_host_srv_count must be non-negative"),
                (
                    "dst_host_same_srv_rate",
                    "dst_host_same_srv_rate must be between 0 and 1",
                ),
                (
                    "dst_host_serror_rate",
                    "dst_host_serror_rate must be between 0 and 1",
                ),
                (
                    "dst_host_srv_serror_rate",
                    "dst_host_srv_serror_rate must be between 0 and 1",
                ),
            ] {
                if field_errors.contains_key(field) {
                    return Err(ValidationFailure {
                        field,
                        message: message.to_string(),
                    });
                }
            }
        }

        if !VALID_FLAGS.contains(&self.flag.as_str()) {
            return Err(ValidationFailure {
                field: "flag",
                message: format!("flag must be one of {:?}", VALID_FLAGS),
            });
        }

        Ok(())
    }

    /// Numeric feature values in the order of [`NUMERIC_FEATURES`].
    pub fn numeric_values(&self) -> [f64; 9] {
        [
            f64::from(u8::from(self.logged_in)),
            self.count as f64,
            self.serror_rate,
            self.srv_serror_rate,
            self.same_srv_rate,
            self.dst_host_srv_count as f64,
            self.dst_host_same_srv_rate,
            self.dst_host_serror_rate,
            self.dst_host_srv_serror_rate,
        ]
    }

    /// Canonical JSON representation (keys sorted by serde_json's map).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> FeatureRecord {
        FeatureRecord {
            logged_in: true,
            count: 45,
            serror_rate: 0.05,
            srv_serror_rate: 0.04,
            same_srv_rate: 0.88,
            dst_host_srv_count: 110,
            dst_host_same_srv_rate: 0.99,
            dst_host_serror_rate: 0.02,
            dst_host_srv_serror_rate: 0.01,
            flag: "S0".to_string(),
        }
    }

    #[test]
    fn valid_record_passes() {
        assert!(sample_record().validate_record().is_ok());
    }

    #[test]
    fn out_of_range_rate_rejected() {
        let mut record = sample_record();
        record.serror_rate = 1.5;
        let failure = record.validate_record().unwrap_err();
        assert_eq!(failure.field, "serror_rate");
        assert!(failure.message.contains("between 0 and 1"));
    }

    #[test]
    fn negative_count_rejected() {
        let mut record = sample_record();
        record.count = -1;
        let failure = record.validate_record().unwrap_err();
        assert_eq!(failure.field, "count");
    }

    #[test]
    fn unknown_flag_rejected() {
        let mut record = sample_record();
        record.flag = "XX".to_string();
        let failure = record.validate_record().unwrap_err();
        assert_eq!(failure.field, "flag");
    }

    #[test]
    fn first_offending_field_wins() {
        let mut record = sample_record();
        record.count = -5;
        record.dst_host_serror_rate = 2.0;
        assert_eq!(record.validate_record().unwrap_err().field, "count");
    }

    #[test]
    fn missing_field_fails_deserialization() {
        let err = serde_json::from_str::<FeatureRecord>(r#"{"logged_in": true}"#).unwrap_err();
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn wrong_type_fails_deserialization() {
        let mut value = serde_json::to_value(sample_record()).unwrap();
        value["count"] = serde_json::json!("forty-five");
        assert!(serde_json::from_value::<FeatureRecord>(value).is_err());
    }

    #[test]
    fn numeric_values_follow_declared_order() {
        let values = sample_record().numeric_values();
        assert_eq!(values.len(), NUMERIC_FEATURES.len());
        assert_eq!(values[0], 1.0); // logged_in
        assert_eq!(values[1], 45.0); // count
        assert_eq!(values[5], 110.0); // dst_host_srv_count
    }
}
