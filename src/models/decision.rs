//! Decision records and the request/response types of the decision API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::ml::schema::FeatureRecord;

/// Outcome label attached to every classified record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationResult {
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "MALICIOUS")]
    Malicious,
}

impl ClassificationResult {
    pub fn from_label(label: u8) -> Self {
        if label == 1 {
            Self::Malicious
        } else {
            Self::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Malicious => "MALICIOUS",
        }
    }
}

/// Persisted decision row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Decision {
    pub id: i64,
    pub user_id: Uuid,
    pub features: serde_json::Value,
    pub classification_result: String,
    pub source_type: String,
    pub correlation_id: String,
    pub model_version: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Fields a new history row is inserted with.
#[derive(Debug, Clone)]
pub struct NewDecision {
    pub user_id: Uuid,
    pub features: serde_json::Value,
    pub classification_result: String,
    pub source_type: String,
    pub correlation_id: String,
    pub model_version: Option<String>,
}

/// Query parameters for the decision history listing.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryFilter {
    pub source_type: Option<String>,
    pub classification_result: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
}

impl HistoryFilter {
    const DEFAULT_LIMIT: i64 = 10;
    const MAX_LIMIT: i64 = 100;

    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// Sort clause is matched against a whitelist; anything else falls
    /// back to newest-first.
    fn order_clause(&self) -> &'static str {
        match self.sort.as_deref() {
            Some("timestamp asc") => "timestamp ASC",
            Some("classification_result asc") => "classification_result ASC, timestamp DESC",
            Some("classification_result desc") => "classification_result DESC, timestamp DESC",
            _ => "timestamp DESC",
        }
    }
}

impl Decision {
    pub async fn insert(pool: &PgPool, new: &NewDecision) -> AppResult<Decision> {
        let decision = sqlx::query_as::<_, Decision>(
            r#"
            INSERT INTO decisions (user_id, features, classification_result, source_type, correlation_id, model_version)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, features, classification_result, source_type, correlation_id, model_version, timestamp
            "#,
        )
        .bind(new.user_id)
        .bind(&new.features)
        .bind(&new.classification_result)
        .bind(&new.source_type)
        .bind(&new.correlation_id)
        .bind(&new.model_version)
        .fetch_one(pool)
        .await?;

        Ok(decision)
    }

    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        filter: &HistoryFilter,
    ) -> AppResult<Vec<Decision>> {
        let query = format!(
            r#"
            SELECT id, user_id, features, classification_result, source_type, correlation_id, model_version, timestamp
            FROM decisions
            WHERE user_id = $1
              AND ($2::varchar IS NULL OR source_type = $2)
              AND ($3::varchar IS NULL OR classification_result = $3)
            ORDER BY {}
            LIMIT $4 OFFSET $5
            "#,
            filter.order_clause()
        );

        let decisions = sqlx::query_as::<_, Decision>(&query)
            .bind(user_id)
            .bind(&filter.source_type)
            .bind(&filter.classification_result)
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(pool)
            .await?;

        Ok(decisions)
    }
}

// ---- request / response types ----

#[derive(Debug, Clone, Deserialize)]
pub struct SingleDecisionRequest {
    pub features: FeatureRecord,
    pub correlation_id: Option<String>,
    pub model_version: Option<String>,
}

impl SingleDecisionRequest {
    /// Correlation id supplied by the caller, or a fresh one.
    pub fn correlation_id(&self) -> String {
        self.correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchDecisionRequest {
    pub traffic_list: Vec<FeatureRecord>,
    pub correlation_id: Option<String>,
    pub model_version: Option<String>,
}

impl BatchDecisionRequest {
    pub fn correlation_id(&self) -> String {
        self.correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub classification_result: ClassificationResult,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub errors: usize,
    pub successful: usize,
}

/// One entry per input record, in input order.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchReportEntry {
    Decision(DecisionResponse),
    Error {
        correlation_id: String,
        error: String,
    },
}

#[derive(Debug, Serialize)]
pub struct BatchDecisionResponse {
    pub summary: BatchSummary,
    pub report: Vec<BatchReportEntry>,
}
