// src/handlers/explainer.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;

use crate::{
    config::Config,
    error::AppError,
    extract::ApiJson,
    models::explainer::{AskRequest, AskResponse, ExplainerStatus},
    services::explainer::{Explainer, explain_with_timeout},
};

/// Free-form hint request for a question the client already holds.
///
/// Answers 503 when no explainer is configured. Any other failure comes back as a
/// readable message in `answer`.
pub async fn ask(
    State(explainer): State<Arc<dyn Explainer>>,
    State(config): State<Config>,
    ApiJson(payload): ApiJson<AskRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.question.trim().is_empty() {
        return Err(AppError::BadRequest("question is required".to_string()));
    }
    if !explainer.is_configured() {
        return Err(AppError::ServiceUnavailable(
            "Explainer is not configured".to_string(),
        ));
    }

    let answer = explain_with_timeout(
        explainer.as_ref(),
        config.explainer_timeout,
        &payload.question,
        &payload.options,
        &payload.history,
    )
    .await;

    Ok(Json(AskResponse {
        success: true,
        answer,
        timestamp: Utc::now(),
    }))
}

pub async fn status(State(explainer): State<Arc<dyn Explainer>>) -> impl IntoResponse {
    Json(ExplainerStatus {
        configured: explainer.is_configured(),
        service: explainer.name(),
    })
}
