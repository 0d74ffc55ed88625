// src/services/history.rs

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::{
    db::Database,
    models::history::{
        HistoryDetail, HistoryRecord, HistorySubmission, MISSING_QUESTION_TEXT, NewHistoryRecord,
        NewOutcome, OutcomeDraft, OutcomeReport, QuestionOutcome, UNKNOWN_CORRECT_ANSWER,
        UNKNOWN_EXAM_LABEL,
    },
    services::{error::ServiceError, users::UserDirectory},
};

/// A submission reduced to its canonical parts.
#[derive(Debug)]
pub struct NormalizedSubmission {
    pub record: NewHistoryRecord,
    pub outcomes: Vec<OutcomeDraft>,
    /// Entries of `questions` that were not objects of the expected shape.
    pub rejected: usize,
}

/// Resolves both naming conventions into one canonical record.
///
/// The underscore form wins when both are present. Missing label falls back to
/// `UNKNOWN_EXAM_LABEL`, missing numbers to 0, a non-array `questions` to no outcomes.
/// A missing user id is the only hard failure besides out-of-range numbers.
pub fn normalize_submission(
    submission: HistorySubmission,
) -> Result<NormalizedSubmission, ServiceError> {
    let user_id = submission
        .user_id
        .filter(|id| *id > 0)
        .or(submission.user_id_compact.filter(|id| *id > 0))
        .ok_or_else(|| ServiceError::validation("user_id is required"))?;

    let exam_type = first_label([submission.exam_type, submission.exam_type_compact])
        .unwrap_or_else(|| UNKNOWN_EXAM_LABEL.to_string());

    let record = NewHistoryRecord {
        user_id,
        exam_type,
        score: submission.score.unwrap_or(0),
        total_questions: submission
            .total_questions
            .or(submission.total_questions_compact)
            .unwrap_or(0),
        time_spent: submission
            .time_spent
            .or(submission.time_spent_compact)
            .unwrap_or(0),
    };
    check_record(&record)?;

    let mut outcomes = Vec::new();
    let mut rejected = 0;
    if let Some(Value::Array(items)) = submission.questions {
        for (position, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<OutcomeDraft>(item) {
                Ok(draft) => outcomes.push(draft),
                Err(e) => {
                    tracing::warn!("Dropping outcome #{} of submission: {}", position, e);
                    rejected += 1;
                }
            }
        }
    }

    tracing::debug!(
        "Normalized submission for user {}: {:?} ({} outcomes, {} rejected)",
        user_id,
        record,
        outcomes.len(),
        rejected
    );

    Ok(NormalizedSubmission {
        record,
        outcomes,
        rejected,
    })
}

/// Resolves an outcome draft into its canonical form.
///
/// A draft without any question-text key is malformed. A text key holding null or
/// blank text gets the placeholder instead.
pub fn normalize_outcome(draft: OutcomeDraft) -> Result<NewOutcome, ServiceError> {
    if !draft.has_text_field() {
        return Err(ServiceError::validation("outcome has no question text"));
    }

    let question_text = [&draft.question_text, &draft.question, &draft.text]
        .into_iter()
        .flatten()
        .find_map(value_as_text)
        .unwrap_or_else(|| MISSING_QUESTION_TEXT.to_string());

    let user_answer = [&draft.user_answer, &draft.user_answer_compact]
        .into_iter()
        .flatten()
        .find_map(value_as_text);

    let correct_answer = [&draft.correct_answer, &draft.correct_answer_compact]
        .into_iter()
        .flatten()
        .find_map(value_as_text)
        .unwrap_or_else(|| UNKNOWN_CORRECT_ANSWER.to_string());

    let is_correct = [&draft.is_correct, &draft.is_correct_compact]
        .into_iter()
        .flatten()
        .find_map(value_as_bool)
        .unwrap_or(false);

    Ok(NewOutcome {
        question_text,
        user_answer,
        correct_answer,
        is_correct,
        explanation: draft.explanation,
        topic: draft.topic,
        difficulty: draft.difficulty,
    })
}

fn first_label<const N: usize>(labels: [Option<String>; N]) -> Option<String> {
    labels
        .into_iter()
        .flatten()
        .map(|label| label.trim().to_string())
        .find(|label| !label.is_empty())
}

fn check_record(record: &NewHistoryRecord) -> Result<(), ServiceError> {
    if record.user_id <= 0 {
        return Err(ServiceError::validation("user_id is required"));
    }
    if record.score < 0 || record.total_questions < 0 || record.time_spent < 0 {
        return Err(ServiceError::validation(
            "score, total_questions and time_spent must not be negative",
        ));
    }
    if record.score > record.total_questions {
        return Err(ServiceError::validation(format!(
            "score {} exceeds total_questions {}",
            record.score, record.total_questions
        )));
    }
    Ok(())
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Append-only store of completed attempts and their per-question snapshots.
#[derive(Clone, Debug)]
pub struct HistoryStore {
    pool: SqlitePool,
    users: UserDirectory,
}

impl HistoryStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            users: UserDirectory::new(db),
        }
    }

    /// Persists one canonical record and returns its id.
    pub async fn save(&self, record: &NewHistoryRecord) -> Result<i64, ServiceError> {
        check_record(record)?;
        self.users.find_by_id(record.user_id).await?;

        let exam_type = match record.exam_type.trim() {
            "" => UNKNOWN_EXAM_LABEL,
            label => label,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO history_records (user_id, exam_type, score, total_questions, time_spent, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(record.user_id)
        .bind(exam_type)
        .bind(record.score)
        .bind(record.total_questions)
        .bind(record.time_spent)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to save history record: {:?}", e);
            ServiceError::from(e)
        })?;

        let id = result.last_insert_rowid();
        tracing::info!(
            "Saved history record {} for user {} ({}/{} on '{}')",
            id,
            record.user_id,
            record.score,
            record.total_questions,
            exam_type
        );
        Ok(id)
    }

    /// Inserts outcome snapshots for `record_id`, one row at a time.
    ///
    /// A malformed draft or a failing row is logged and skipped; the remaining rows and
    /// the parent record are unaffected. Positions follow the submitted order.
    pub async fn add_outcomes(&self, record_id: i64, outcomes: Vec<OutcomeDraft>) -> OutcomeReport {
        let mut report = OutcomeReport::default();

        for (position, draft) in outcomes.into_iter().enumerate() {
            let outcome = match normalize_outcome(draft) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(
                        "Skipping outcome #{} of record {}: {}",
                        position,
                        record_id,
                        e
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            let inserted = sqlx::query(
                r#"
                INSERT INTO history_outcomes
                    (history_record_id, position, question_text, user_answer, correct_answer,
                     is_correct, explanation, topic, difficulty)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(record_id)
            .bind(position as i64)
            .bind(&outcome.question_text)
            .bind(&outcome.user_answer)
            .bind(&outcome.correct_answer)
            .bind(outcome.is_correct)
            .bind(&outcome.explanation)
            .bind(&outcome.topic)
            .bind(&outcome.difficulty)
            .execute(&self.pool)
            .await;

            match inserted {
                Ok(_) => report.inserted += 1,
                Err(e) => {
                    tracing::warn!(
                        "Failed to insert outcome #{} of record {}: {:?}",
                        position,
                        record_id,
                        e
                    );
                    report.skipped += 1;
                }
            }
        }

        tracing::debug!(
            "Outcomes for record {}: {} inserted, {} skipped",
            record_id,
            report.inserted,
            report.skipped
        );
        report
    }

    /// Normalizes a raw submission, saves the record, then its outcomes.
    pub async fn submit(
        &self,
        submission: HistorySubmission,
    ) -> Result<(i64, OutcomeReport), ServiceError> {
        let normalized = normalize_submission(submission)?;
        let id = self.save(&normalized.record).await?;
        let mut report = self.add_outcomes(id, normalized.outcomes).await;
        report.skipped += normalized.rejected;
        Ok((id, report))
    }

    /// Records of a user, most recent first.
    pub async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<HistoryRecord>, ServiceError> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT id, user_id, exam_type, score, total_questions, time_spent, completed_at
            FROM history_records
            WHERE user_id = ?1
            ORDER BY completed_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn find_with_outcomes(&self, record_id: i64) -> Result<HistoryDetail, ServiceError> {
        let record = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT id, user_id, exam_type, score, total_questions, time_spent, completed_at
            FROM history_records
            WHERE id = ?1
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("History record {} not found", record_id)))?;

        let questions = sqlx::query_as::<_, QuestionOutcome>(
            r#"
            SELECT position, question_text, user_answer, correct_answer, is_correct,
                   explanation, topic, difficulty
            FROM history_outcomes
            WHERE history_record_id = ?1
            ORDER BY position, id
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(HistoryDetail { record, questions })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) async fn insert_user(db: &Database, name: &str) -> i64 {
        sqlx::query("INSERT INTO users (name, email, password) VALUES (?1, ?2, 'x')")
            .bind(name)
            .bind(format!("{}@example.com", name))
            .execute(db.pool())
            .await
            .unwrap()
            .last_insert_rowid()
    }

    fn submission(value: serde_json::Value) -> HistorySubmission {
        serde_json::from_value(value).unwrap()
    }

    fn draft(value: serde_json::Value) -> OutcomeDraft {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_both_conventions_normalize_identically() {
        let compact = normalize_submission(submission(json!({
            "userId": 7, "examType": "Math", "score": 3, "totalQuestions": 5, "timeSpent": 60
        })))
        .unwrap();
        let underscore = normalize_submission(submission(json!({
            "user_id": 7, "exam_type": "Math", "score": 3, "total_questions": 5, "time_spent": 60
        })))
        .unwrap();

        assert_eq!(compact.record, underscore.record);
        assert_eq!(
            underscore.record,
            NewHistoryRecord {
                user_id: 7,
                exam_type: "Math".to_string(),
                score: 3,
                total_questions: 5,
                time_spent: 60,
            }
        );
    }

    #[test]
    fn test_normalize_defaults() {
        let normalized = normalize_submission(submission(json!({
            "user_id": "12",
            "questions": "not a list"
        })))
        .unwrap();

        assert_eq!(normalized.record.user_id, 12);
        assert_eq!(normalized.record.exam_type, UNKNOWN_EXAM_LABEL);
        assert_eq!(normalized.record.score, 0);
        assert_eq!(normalized.record.total_questions, 0);
        assert_eq!(normalized.record.time_spent, 0);
        assert!(normalized.outcomes.is_empty());
        assert_eq!(normalized.rejected, 0);
    }

    #[test]
    fn test_normalize_requires_user() {
        for body in [
            json!({"exam_type": "Math"}),
            json!({"user_id": null, "examType": "Math"}),
            json!({"userId": 0}),
            json!({"user_id": "abc"}),
        ] {
            assert!(matches!(
                normalize_submission(submission(body)),
                Err(ServiceError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_normalize_rejects_score_above_total() {
        let result = normalize_submission(submission(json!({
            "user_id": 1, "score": 6, "total_questions": 5
        })));
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_normalize_counts_non_object_outcomes() {
        let normalized = normalize_submission(submission(json!({
            "user_id": 1,
            "questions": [{"question": "Q1"}, 42, "Q3"]
        })))
        .unwrap();
        assert_eq!(normalized.outcomes.len(), 1);
        assert_eq!(normalized.rejected, 2);
    }

    #[test]
    fn test_normalize_outcome_aliases_and_defaults() {
        let outcome = normalize_outcome(draft(json!({
            "question": "What is 2+2?",
            "userAnswer": 1,
            "correctAnswer": 3,
            "isCorrect": false,
            "explanation": "Count"
        })))
        .unwrap();
        assert_eq!(outcome.question_text, "What is 2+2?");
        assert_eq!(outcome.user_answer.as_deref(), Some("1"));
        assert_eq!(outcome.correct_answer, "3");
        assert!(!outcome.is_correct);
        assert_eq!(outcome.explanation.as_deref(), Some("Count"));

        let sparse = normalize_outcome(draft(json!({"text": null}))).unwrap();
        assert_eq!(sparse.question_text, MISSING_QUESTION_TEXT);
        assert_eq!(sparse.correct_answer, UNKNOWN_CORRECT_ANSWER);
        assert_eq!(sparse.user_answer, None);
        assert!(!sparse.is_correct);

        let missing = normalize_outcome(draft(json!({"user_answer": "a"})));
        assert!(matches!(missing, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_save_equivalent_shapes_persist_equal_records() {
        let db = Database::in_memory().await.unwrap();
        let store = HistoryStore::new(&db);
        let user = insert_user(&db, "seven").await;

        let (first, _) = store
            .submit(submission(json!({
                "userId": user, "examType": "Math", "score": 3, "totalQuestions": 5, "timeSpent": 60
            })))
            .await
            .unwrap();
        let (second, _) = store
            .submit(submission(json!({
                "user_id": user, "exam_type": "Math", "score": 3, "total_questions": 5, "time_spent": 60
            })))
            .await
            .unwrap();
        assert_ne!(first, second);

        let a = store.find_with_outcomes(first).await.unwrap().record;
        let b = store.find_with_outcomes(second).await.unwrap().record;
        assert_eq!(
            (a.user_id, &a.exam_type, a.score, a.total_questions, a.time_spent),
            (b.user_id, &b.exam_type, b.score, b.total_questions, b.time_spent)
        );
        assert_eq!(a.exam_type, "Math");
    }

    #[tokio::test]
    async fn test_save_unknown_user_is_not_found() {
        let db = Database::in_memory().await.unwrap();
        let store = HistoryStore::new(&db);

        let record = NewHistoryRecord {
            user_id: 404,
            exam_type: "Math".to_string(),
            score: 0,
            total_questions: 1,
            time_spent: 0,
        };
        assert!(matches!(
            store.save(&record).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(store.find_by_user_id(404).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_outcomes_skips_malformed_entries() {
        let db = Database::in_memory().await.unwrap();
        let store = HistoryStore::new(&db);
        let user = insert_user(&db, "partial").await;

        let record_id = store
            .save(&NewHistoryRecord {
                user_id: user,
                exam_type: "Physics".to_string(),
                score: 1,
                total_questions: 3,
                time_spent: 12,
            })
            .await
            .unwrap();

        let report = store
            .add_outcomes(
                record_id,
                vec![
                    draft(json!({"question_text": "Q1", "user_answer": "0", "correct_answer": "0", "is_correct": true})),
                    draft(json!({"user_answer": "1", "correct_answer": "2"})),
                    draft(json!({"question_text": "Q3", "correct_answer": "1"})),
                ],
            )
            .await;

        assert_eq!(report, OutcomeReport { inserted: 2, skipped: 1 });

        let detail = store.find_with_outcomes(record_id).await.unwrap();
        assert_eq!(detail.record.exam_type, "Physics");
        let texts: Vec<&str> = detail
            .questions
            .iter()
            .map(|q| q.question_text.as_str())
            .collect();
        assert_eq!(texts, vec!["Q1", "Q3"]);
        assert!(detail.questions[0].is_correct);
        assert!(!detail.questions[1].is_correct);
        assert_eq!(detail.questions[1].user_answer, None);
    }

    #[tokio::test]
    async fn test_add_outcomes_for_missing_record_does_not_fail() {
        let db = Database::in_memory().await.unwrap();
        let store = HistoryStore::new(&db);

        let report = store
            .add_outcomes(999, vec![draft(json!({"question_text": "Q1"}))])
            .await;
        assert_eq!(report, OutcomeReport { inserted: 0, skipped: 1 });
    }

    #[tokio::test]
    async fn test_find_by_user_orders_most_recent_first() {
        let db = Database::in_memory().await.unwrap();
        let store = HistoryStore::new(&db);
        let user = insert_user(&db, "ordered").await;
        let other = insert_user(&db, "other").await;

        let mut ids = Vec::new();
        for label in ["first", "second", "third"] {
            let record = NewHistoryRecord {
                user_id: user,
                exam_type: label.to_string(),
                score: 1,
                total_questions: 2,
                time_spent: 5,
            };
            ids.push(store.save(&record).await.unwrap());
        }
        store
            .save(&NewHistoryRecord {
                user_id: other,
                exam_type: "elsewhere".to_string(),
                score: 0,
                total_questions: 1,
                time_spent: 0,
            })
            .await
            .unwrap();

        let records = store.find_by_user_id(user).await.unwrap();
        let labels: Vec<&str> = records.iter().map(|r| r.exam_type.as_str()).collect();
        assert_eq!(labels, vec!["third", "second", "first"]);
        assert!(records.windows(2).all(|w| w[0].completed_at >= w[1].completed_at));
    }

    #[tokio::test]
    async fn test_find_with_outcomes_not_found() {
        let db = Database::in_memory().await.unwrap();
        let store = HistoryStore::new(&db);
        assert!(matches!(
            store.find_with_outcomes(1).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
