// src/models/history.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Label stored when a submission carries no exam label.
pub const UNKNOWN_EXAM_LABEL: &str = "Unknown Exam";
/// Stored when an outcome's question text is null or blank.
pub const MISSING_QUESTION_TEXT: &str = "Question without text";
/// Stored when an outcome does not say what the right answer was.
pub const UNKNOWN_CORRECT_ANSWER: &str = "Unknown answer";

/// Represents the 'history_records' table in the database.
/// One row per completed attempt; rows are never updated.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub user_id: i64,
    pub exam_type: String,
    pub score: i64,
    pub total_questions: i64,
    /// Seconds.
    pub time_spent: i64,
    pub completed_at: DateTime<Utc>,
}

/// Canonical attempt record, produced by ingress normalization or by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryRecord {
    pub user_id: i64,
    pub exam_type: String,
    pub score: i64,
    pub total_questions: i64,
    pub time_spent: i64,
}

/// Represents the 'history_outcomes' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub position: i64,
    pub question_text: String,
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub explanation: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<String>,
}

/// Canonical outcome snapshot, ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutcome {
    pub question_text: String,
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub explanation: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<String>,
}

/// Per-question snapshot as submitted by a client.
///
/// Accepts `question_text|question|text`, `user_answer|userAnswer`,
/// `correct_answer|correctAnswer` and `is_correct|isCorrect`. Answers may be numbers
/// or strings. A key that is present with a `null` value is kept apart from an absent key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutcomeDraft {
    #[serde(default, deserialize_with = "present")]
    pub question_text: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub question: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub text: Option<Value>,

    #[serde(default)]
    pub user_answer: Option<Value>,
    #[serde(default, rename = "userAnswer")]
    pub user_answer_compact: Option<Value>,

    #[serde(default)]
    pub correct_answer: Option<Value>,
    #[serde(default, rename = "correctAnswer")]
    pub correct_answer_compact: Option<Value>,

    #[serde(default)]
    pub is_correct: Option<Value>,
    #[serde(default, rename = "isCorrect")]
    pub is_correct_compact: Option<Value>,

    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl OutcomeDraft {
    /// Draft built from an in-process attempt, already in canonical naming.
    pub fn snapshot(outcome: NewOutcome) -> Self {
        Self {
            question_text: Some(Value::String(outcome.question_text)),
            user_answer: outcome.user_answer.map(Value::String),
            correct_answer: Some(Value::String(outcome.correct_answer)),
            is_correct: Some(Value::Bool(outcome.is_correct)),
            explanation: outcome.explanation,
            topic: outcome.topic,
            difficulty: outcome.difficulty,
            ..Self::default()
        }
    }

    /// Whether any question-text key was sent at all.
    pub fn has_text_field(&self) -> bool {
        self.question_text.is_some() || self.question.is_some() || self.text.is_some()
    }
}

/// History submission in either naming convention.
///
/// Numbers may arrive as JSON numbers or numeric strings. `questions` is kept as raw JSON
/// so a non-array value can be treated as an empty list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistorySubmission {
    #[serde(default, deserialize_with = "lenient_int")]
    pub user_id: Option<i64>,
    #[serde(default, rename = "userId", deserialize_with = "lenient_int")]
    pub user_id_compact: Option<i64>,

    #[serde(default)]
    pub exam_type: Option<String>,
    #[serde(default, rename = "examType")]
    pub exam_type_compact: Option<String>,

    #[serde(default, deserialize_with = "lenient_int")]
    pub score: Option<i64>,

    #[serde(default, deserialize_with = "lenient_int")]
    pub total_questions: Option<i64>,
    #[serde(default, rename = "totalQuestions", deserialize_with = "lenient_int")]
    pub total_questions_compact: Option<i64>,

    #[serde(default, deserialize_with = "lenient_int")]
    pub time_spent: Option<i64>,
    #[serde(default, rename = "timeSpent", deserialize_with = "lenient_int")]
    pub time_spent_compact: Option<i64>,

    #[serde(default)]
    pub questions: Option<Value>,
}

/// Query parameters accepted by the stats route that takes the user as a query string.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<i64>,
    #[serde(rename = "userId")]
    pub user_id_compact: Option<i64>,
}

impl UserQuery {
    pub fn resolve(&self) -> Option<i64> {
        self.user_id.or(self.user_id_compact)
    }
}

/// A history record merged with its outcome list.
#[derive(Debug, Serialize)]
pub struct HistoryDetail {
    #[serde(flatten)]
    pub record: HistoryRecord,
    pub questions: Vec<QuestionOutcome>,
}

/// Result of a bulk outcome insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeReport {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize)]
pub struct SaveHistoryResponse {
    pub message: String,
    pub history_id: i64,
    pub outcomes_saved: usize,
    pub outcomes_skipped: usize,
}

/// Keeps `null` distinguishable from an absent key.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Accepts integers, integral floats and numeric strings. Anything else reads as absent.
fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_i64))
}

pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
