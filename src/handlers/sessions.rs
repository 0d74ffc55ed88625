// src/handlers/sessions.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    extract::{ApiJson, ApiPath},
    models::{
        explainer::AskResponse,
        session::{
            AnswerRequest, AnswerResponse, HintRequest, SessionStepResponse, StartSessionRequest,
        },
    },
    services::{
        catalog::ExamCatalog,
        explainer::{Explainer, explain_with_timeout},
        history::HistoryStore,
        session::{Advance, ExamSession, SessionRegistry},
    },
};

/// Starts an attempt on an active exam and returns its first view.
pub async fn start_session(
    State(catalog): State<ExamCatalog>,
    State(sessions): State<SessionRegistry>,
    ApiJson(payload): ApiJson<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = ExamSession::start(&catalog, payload.exam_id, payload.user_id).await?;
    let (id, shared) = sessions.insert(session);
    let view = shared.lock().await.view(id);

    tracing::info!(
        "Session {} started on exam {} for user {}",
        id,
        view.exam_id,
        view.user_id
    );

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(sessions): State<SessionRegistry>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = sessions.get(id)?;
    let session = shared.lock().await;
    Ok(Json(session.view(id)))
}

/// Locks an answer for one question. A second answer for the same question is a 409.
pub async fn answer(
    State(sessions): State<SessionRegistry>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let shared = sessions.get(id)?;
    let mut session = shared.lock().await;

    let is_correct = session.select_answer(payload.index, payload.choice)?;
    let revealed = session
        .question_view(payload.index)
        .ok_or_else(|| AppError::InternalServerError("answered question vanished".to_string()))?;

    Ok(Json(AnswerResponse {
        is_correct,
        answer_index: revealed.answer_index.unwrap_or_default(),
        explanation: revealed.explanation,
        session: session.view(id),
    }))
}

/// Moves to the next question, or completes the attempt at the last one.
pub async fn advance(
    State(sessions): State<SessionRegistry>,
    State(store): State<HistoryStore>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = sessions.get(id)?;
    let mut session = shared.lock().await;

    let summary = match session.advance(&store).await? {
        Advance::Moved { .. } => None,
        Advance::Completed(summary) => Some(summary),
    };

    Ok(Json(SessionStepResponse {
        session: session.view(id),
        summary,
    }))
}

pub async fn retreat(
    State(sessions): State<SessionRegistry>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = sessions.get(id)?;
    let mut session = shared.lock().await;
    session.retreat()?;

    Ok(Json(SessionStepResponse {
        session: session.view(id),
        summary: None,
    }))
}

/// Submits the attempt. Retried submissions get a 409 and write nothing.
pub async fn finalize(
    State(sessions): State<SessionRegistry>,
    State(store): State<HistoryStore>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = sessions.get(id)?;
    let mut session = shared.lock().await;
    let summary = session.finalize(&store).await?;

    Ok(Json(SessionStepResponse {
        session: session.view(id),
        summary: Some(summary),
    }))
}

/// Drops a session. Unfinished attempts are discarded without a record.
pub async fn discard(
    State(sessions): State<SessionRegistry>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sessions.remove(id)?;
    tracing::info!("Session {} discarded", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Asks the explainer about the current question.
///
/// The session is only locked while the question is copied out, so answering and
/// navigation never wait for the explainer.
pub async fn hint(
    State(sessions): State<SessionRegistry>,
    State(explainer): State<Arc<dyn Explainer>>,
    State(config): State<Config>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<HintRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = {
        let shared = sessions.get(id)?;
        let session = shared.lock().await;
        session
            .current_question()
            .cloned()
            .ok_or_else(|| AppError::Conflict("session has no current question".to_string()))?
    };

    let answer = explain_with_timeout(
        explainer.as_ref(),
        config.explainer_timeout,
        &question.text,
        &question.options,
        &payload.history,
    )
    .await;

    Ok(Json(AskResponse {
        success: true,
        answer,
        timestamp: Utc::now(),
    }))
}
