//! Decision handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::cache::CacheStats;
use crate::middleware::auth::UserContext;
use crate::models::{
    BatchDecisionRequest, BatchDecisionResponse, Decision, DecisionResponse, HistoryFilter,
    SingleDecisionRequest,
};
use crate::{AppError, AppResult, AppState};

/// Classify a single traffic record
pub async fn analyze_single(
    State(state): State<AppState>,
    user: UserContext,
    Json(req): Json<SingleDecisionRequest>,
) -> AppResult<Json<DecisionResponse>> {
    let response = state.service.decide_single(user.user_id, &req).await?;
    Ok(Json(response))
}

/// Classify a batch of traffic records
pub async fn analyze_batch(
    State(state): State<AppState>,
    user: UserContext,
    Json(req): Json<BatchDecisionRequest>,
) -> AppResult<Json<BatchDecisionResponse>> {
    if req.traffic_list.is_empty() {
        return Err(AppError::ValidationError(
            "traffic_list must not be empty".to_string(),
        ));
    }

    let response = state.service.decide_batch(user.user_id, &req).await?;
    Ok(Json(response))
}

/// List the caller's decision history
pub async fn list_history(
    State(state): State<AppState>,
    user: UserContext,
    Query(filter): Query<HistoryFilter>,
) -> AppResult<Json<Vec<Decision>>> {
    let decisions = Decision::list_for_user(&state.pool, user.user_id, &filter).await?;
    Ok(Json(decisions))
}

/// Cache statistics
pub async fn cache_stats(
    State(state): State<AppState>,
    _user: UserContext,
) -> AppResult<Json<CacheStats>> {
    let stats = state
        .cache
        .stats()
        .await
        .map_err(|e| AppError::CacheError(e.to_string()))?;
    Ok(Json(stats))
}

/// Clear every cached decision under the service prefix
pub async fn clear_cache(
    State(state): State<AppState>,
    _user: UserContext,
) -> AppResult<Json<Value>> {
    let removed = state
        .cache
        .clear()
        .await
        .map_err(|e| AppError::CacheError(e.to_string()))?;
    Ok(Json(json!({
        "cleared": removed,
        "message": "Cache cleared"
    })))
}
