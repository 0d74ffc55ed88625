// src/models/session.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::explainer::ChatMessage;

/// DTO for starting an attempt.
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub exam_id: i64,
    #[serde(alias = "userId")]
    pub user_id: i64,
}

/// DTO for answering one question of a running attempt.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    /// Question position within the attempt.
    pub index: usize,
    /// Chosen option, 0..=3.
    pub choice: usize,
}

/// DTO for asking the explainer about the current question.
#[derive(Debug, Default, Deserialize)]
pub struct HintRequest {
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// One question as seen during an attempt.
/// The answer key and explanation are only revealed once the question is locked.
#[derive(Debug, Clone, Serialize)]
pub struct SessionQuestionView {
    pub id: i64,
    pub text: String,
    pub options: [String; 4],
    pub topic: Option<String>,
    pub difficulty: Option<String>,
    pub selected_index: Option<usize>,
    pub is_correct: Option<bool>,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Snapshot of an attempt returned by every session route.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub exam_id: i64,
    pub exam_type: String,
    pub user_id: i64,
    /// "active", "finalizing" or "completed".
    pub state: &'static str,
    pub current_index: Option<usize>,
    pub total_questions: usize,
    pub answered: usize,
    pub score: usize,
    pub record_id: Option<i64>,
    pub current_question: Option<SessionQuestionView>,
}

/// What a finalized attempt produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptSummary {
    pub record_id: i64,
    pub score: i64,
    pub total_questions: i64,
    pub time_spent: i64,
    pub outcomes_saved: usize,
    pub outcomes_skipped: usize,
}

/// Response of navigation and finalize routes.
#[derive(Debug, Serialize)]
pub struct SessionStepResponse {
    pub session: SessionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<AttemptSummary>,
}

/// Response of the answer route.
#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub is_correct: bool,
    pub answer_index: usize,
    pub explanation: Option<String>,
    pub session: SessionView,
}
