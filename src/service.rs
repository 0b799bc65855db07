//! Decision orchestration: validation, cache lookup, classification,
//! and history recording for single and batch requests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::cache::{cache_key, CachedDecision, DecisionCache};
use crate::error::{AppError, AppResult};
use crate::ml::classifier::TrainedClassifier;
use crate::ml::preprocess::Preprocessor;
use crate::ml::schema::FeatureRecord;
use crate::models::{
    BatchDecisionRequest, BatchDecisionResponse, BatchReportEntry, BatchSummary,
    ClassificationResult, Decision, DecisionResponse, NewDecision, SingleDecisionRequest,
};

/// Immutable serving state loaded once at startup.
pub struct MlContext {
    pub preprocessor: Preprocessor,
    pub classifier: TrainedClassifier,
    pub model_version: String,
}

/// Persistence of classified decisions. Failures here never fail a
/// classification request.
#[async_trait]
pub trait HistoryRecorder: Send + Sync {
    async fn record(&self, decision: &NewDecision) -> anyhow::Result<()>;
}

pub struct PostgresHistory {
    pool: PgPool,
}

impl PostgresHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRecorder for PostgresHistory {
    async fn record(&self, decision: &NewDecision) -> anyhow::Result<()> {
        Decision::insert(&self.pool, decision).await?;
        Ok(())
    }
}

pub struct DecisionService {
    ml: Option<Arc<MlContext>>,
    cache: Arc<dyn DecisionCache>,
    history: Arc<dyn HistoryRecorder>,
}

/// Log and swallow a failure from an auxiliary operation. Cache and
/// history are conveniences around the classification path, not part
/// of its contract.
fn best_effort<T, E: std::fmt::Display>(operation: &'static str, result: Result<T, E>) {
    if let Err(e) = result {
        tracing::warn!(operation, error = %e, "auxiliary operation failed, continuing");
    }
}

impl DecisionService {
    pub fn new(
        ml: Option<Arc<MlContext>>,
        cache: Arc<dyn DecisionCache>,
        history: Arc<dyn HistoryRecorder>,
    ) -> Self {
        Self { ml, cache, history }
    }

    fn ml(&self) -> AppResult<&MlContext> {
        self.ml.as_deref().ok_or(AppError::NotInitialized)
    }

    /// Classify one feature record: validate, consult the cache, then
    /// run the model.
    pub async fn decide_single(
        &self,
        user_id: Uuid,
        request: &SingleDecisionRequest,
    ) -> AppResult<DecisionResponse> {
        let ml = self.ml()?;
        let correlation_id = request.correlation_id();
        self.classify_record(ml, user_id, &request.features, correlation_id, "single")
            .await
    }

    /// Classify a list of records independently. Per-record failures
    /// are reported in place; they never abort the rest of the batch.
    pub async fn decide_batch(
        &self,
        user_id: Uuid,
        request: &BatchDecisionRequest,
    ) -> AppResult<BatchDecisionResponse> {
        let ml = self.ml()?;
        let base_id = request.correlation_id();

        let mut report = Vec::with_capacity(request.traffic_list.len());
        let mut errors = 0usize;

        for (i, record) in request.traffic_list.iter().enumerate() {
            let correlation_id = format!("{base_id}_{i}");
            match self
                .classify_record(ml, user_id, record, correlation_id.clone(), "batch")
                .await
            {
                Ok(response) => report.push(BatchReportEntry::Decision(response)),
                Err(e) => {
                    errors += 1;
                    report.push(BatchReportEntry::Error {
                        correlation_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        let processed = request.traffic_list.len();
        Ok(BatchDecisionResponse {
            summary: BatchSummary {
                processed,
                errors,
                successful: processed - errors,
            },
            report,
        })
    }

    async fn classify_record(
        &self,
        ml: &MlContext,
        user_id: Uuid,
        record: &FeatureRecord,
        correlation_id: String,
        source_type: &str,
    ) -> AppResult<DecisionResponse> {
        record
            .validate_record()
            .map_err(|f| AppError::ValidationError(f.to_string()))?;

        let features = record.to_json();
        let key = cache_key(&features, user_id);

        // Cache read is best-effort: a failing cache degrades to a miss.
        match self.cache.get(&key).await {
            Ok(Some(cached)) => {
                tracing::debug!(%correlation_id, "cache hit");
                let result = match cached.classification_result.as_str() {
                    "MALICIOUS" => ClassificationResult::Malicious,
                    _ => ClassificationResult::Normal,
                };
                return Ok(DecisionResponse {
                    classification_result: result,
                    timestamp: Utc::now(),
                    correlation_id,
                });
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed, treating as miss");
            }
        }

        let matrix = ml
            .preprocessor
            .transform(std::slice::from_ref(record))
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        let label = ml.classifier.predict(&matrix)[0];
        let result = ClassificationResult::from_label(label);

        best_effort(
            "cache put",
            self.cache
                .put(
                    &key,
                    &CachedDecision {
                        features: features.clone(),
                        user_id,
                        classification_result: result.as_str().to_string(),
                        cached_at: Utc::now(),
                    },
                )
                .await,
        );

        best_effort(
            "history record",
            self.history
                .record(&NewDecision {
                    user_id,
                    features,
                    classification_result: result.as_str().to_string(),
                    source_type: source_type.to_string(),
                    correlation_id: correlation_id.clone(),
                    model_version: Some(ml.model_version.clone()),
                })
                .await,
        );

        Ok(DecisionResponse {
            classification_result: result,
            timestamp: Utc::now(),
            correlation_id,
        })
    }
}
