// src/handlers/history.rs

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    extract::{ApiJson, ApiPath},
    models::history::{HistorySubmission, SaveHistoryResponse},
    services::history::HistoryStore,
};

/// Saves a completed attempt sent by a client.
///
/// Accepts both `user_id`/`exam_type` and `userId`/`examType` style payloads. Outcome
/// rows that cannot be stored are skipped and counted, they never fail the request.
pub async fn save_history(
    State(store): State<HistoryStore>,
    ApiJson(payload): ApiJson<HistorySubmission>,
) -> Result<impl IntoResponse, AppError> {
    let (history_id, report) = store.submit(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(SaveHistoryResponse {
            message: "History saved".to_string(),
            history_id,
            outcomes_saved: report.inserted,
            outcomes_skipped: report.skipped,
        }),
    ))
}

/// History records of a user, most recent first.
pub async fn list_user_history(
    State(store): State<HistoryStore>,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let records = store.find_by_user_id(user_id).await?;
    Ok(Json(records))
}

pub async fn get_history(
    State(store): State<HistoryStore>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let detail = store.find_with_outcomes(id).await?;
    Ok(Json(detail))
}
