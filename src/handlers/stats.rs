// src/handlers/stats.rs

use axum::{
    Json,
    extract::State,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    extract::{ApiPath, ApiQuery},
    models::{history::UserQuery, stats::StatsResponse},
    services::stats::StatsAggregator,
};

async fn build_stats(stats: &StatsAggregator, user_id: i64) -> Result<StatsResponse, AppError> {
    let totals = stats.user_stats(user_id).await?;
    let by_subject = stats.stats_by_subject(user_id).await?;

    Ok(StatsResponse {
        user_id,
        stats: totals,
        by_subject,
    })
}

/// `GET /api/history/user/{user_id}/stats`
pub async fn user_stats(
    State(stats): State<StatsAggregator>,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(build_stats(&stats, user_id).await?))
}

/// `GET /api/history/stats?userId=..` (or `user_id=`).
pub async fn stats_by_query(
    State(stats): State<StatsAggregator>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = query
        .resolve()
        .ok_or_else(|| AppError::BadRequest("userId is required".to_string()))?;

    Ok(Json(build_stats(&stats, user_id).await?))
}
