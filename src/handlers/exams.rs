// src/handlers/exams.rs

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        exam::{CreateExamRequest, ExamDetailResponse, ExamListParams},
        question::CreateQuestionRequest,
    },
    services::catalog::ExamCatalog,
};

/// Lists exams ordered by title.
///
/// Only active exams unless `?include_inactive=true`.
pub async fn list_exams(
    State(catalog): State<ExamCatalog>,
    ApiQuery(params): ApiQuery<ExamListParams>,
) -> Result<impl IntoResponse, AppError> {
    let exams = catalog.list_exams(!params.include_inactive).await?;
    Ok(Json(exams))
}

/// Returns an active exam with its questions in delivery form.
pub async fn get_exam(
    State(catalog): State<ExamCatalog>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let (exam, questions) = catalog.get_deliverable(id).await?;
    Ok(Json(ExamDetailResponse { exam, questions }))
}

pub async fn create_exam(
    State(catalog): State<ExamCatalog>,
    ApiJson(payload): ApiJson<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = catalog.create_exam(&payload).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Adds a question to an exam. `correct_answer` is one of the letters a-d.
pub async fn add_question(
    State(catalog): State<ExamCatalog>,
    ApiPath(exam_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = catalog.add_question(exam_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}
