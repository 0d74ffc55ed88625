// src/services/catalog.rs

use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    db::Database,
    models::{
        exam::{CreateExamRequest, Exam, ExamRow},
        question::{CreateQuestionRequest, DeliveredQuestion, Question},
    },
    services::error::ServiceError,
};

/// Answer letters in option order. A stored key maps to its position in this table.
pub const ANSWER_LETTERS: [&str; 4] = ["a", "b", "c", "d"];

/// Maps a stored answer letter to an option index.
///
/// The letter is lower-cased and looked up in `ANSWER_LETTERS`; anything outside the
/// table is rejected rather than defaulted.
pub fn answer_index(letter: &str) -> Result<usize, ServiceError> {
    let normalized = letter.to_lowercase();
    ANSWER_LETTERS
        .iter()
        .position(|candidate| *candidate == normalized)
        .ok_or_else(|| {
            ServiceError::validation(format!(
                "correct answer '{}' is not one of a, b, c, d",
                letter
            ))
        })
}

/// Builds the client-safe projection of a stored question.
pub fn format_for_delivery(question: &Question) -> Result<DeliveredQuestion, ServiceError> {
    let answer_index = answer_index(&question.correct_answer).map_err(|e| {
        tracing::error!(
            "Question {} of exam {} has a corrupt answer key: {}",
            question.id,
            question.exam_id,
            e
        );
        e
    })?;

    Ok(DeliveredQuestion {
        id: question.id,
        text: question.question_text.clone(),
        options: question.options(),
        answer_index,
        explanation: question.explanation.clone(),
        topic: question.topic.clone(),
        difficulty: question.difficulty.clone(),
    })
}

const EXAM_COLUMNS: &str =
    "id, title, description, subject, difficulty, total_questions, duration_minutes, is_active";

/// Read-mostly store of exams and their question pools.
#[derive(Clone, Debug)]
pub struct ExamCatalog {
    pool: SqlitePool,
}

impl ExamCatalog {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Lists exams ordered by title. Inactive exams only when `active_only` is false.
    pub async fn list_exams(&self, active_only: bool) -> Result<Vec<Exam>, ServiceError> {
        let sql = format!(
            "SELECT {} FROM exams WHERE (?1 = 0 OR is_active = 1) ORDER BY title, id",
            EXAM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ExamRow>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(exam_from_row).collect()
    }

    /// Fetches one active exam.
    pub async fn get_exam(&self, id: i64) -> Result<Exam, ServiceError> {
        let sql = format!(
            "SELECT {} FROM exams WHERE id = ?1 AND is_active = 1",
            EXAM_COLUMNS
        );
        let row = sqlx::query_as::<_, ExamRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Exam {} not found", id)))?;

        exam_from_row(row)
    }

    /// Questions of an exam ordered by id.
    pub async fn get_questions(&self, exam_id: i64) -> Result<Vec<Question>, ServiceError> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, exam_id, question_text, option_a, option_b, option_c, option_d,
                   correct_answer, explanation, topic, difficulty
            FROM question_pool
            WHERE exam_id = ?1
            ORDER BY id
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    /// Active exam plus its questions in delivery form.
    pub async fn get_deliverable(
        &self,
        exam_id: i64,
    ) -> Result<(Exam, Vec<DeliveredQuestion>), ServiceError> {
        let exam = self.get_exam(exam_id).await?;
        let questions = self
            .get_questions(exam_id)
            .await?
            .iter()
            .map(format_for_delivery)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((exam, questions))
    }

    pub async fn create_exam(&self, data: &CreateExamRequest) -> Result<i64, ServiceError> {
        data.validate()?;

        let result = sqlx::query(
            r#"
            INSERT INTO exams (title, description, subject, difficulty, total_questions, duration_minutes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.subject)
        .bind(data.difficulty.as_str())
        .bind(data.total_questions)
        .bind(data.duration_minutes)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create exam: {:?}", e);
            ServiceError::from(e)
        })?;

        let id = result.last_insert_rowid();
        tracing::info!("Created exam {} '{}'", id, data.title);
        Ok(id)
    }

    /// Adds a question to an existing exam, active or not.
    pub async fn add_question(
        &self,
        exam_id: i64,
        data: &CreateQuestionRequest,
    ) -> Result<i64, ServiceError> {
        data.validate()?;
        // Reject before touching the table, the validator only reports a code.
        answer_index(&data.correct_answer)?;

        let exists = sqlx::query("SELECT 1 FROM exams WHERE id = ?1")
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(ServiceError::not_found(format!("Exam {} not found", exam_id)));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO question_pool
                (exam_id, question_text, option_a, option_b, option_c, option_d,
                 correct_answer, explanation, topic, difficulty)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(exam_id)
        .bind(&data.question_text)
        .bind(&data.option_a)
        .bind(&data.option_b)
        .bind(&data.option_c)
        .bind(&data.option_d)
        .bind(data.correct_answer.to_lowercase())
        .bind(&data.explanation)
        .bind(&data.topic)
        .bind(&data.difficulty)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to add question to exam {}: {:?}", exam_id, e);
            ServiceError::from(e)
        })?;

        Ok(result.last_insert_rowid())
    }
}

fn exam_from_row(row: ExamRow) -> Result<Exam, ServiceError> {
    let id = row.id;
    Exam::try_from(row).map_err(|e| {
        tracing::error!("Exam {} has invalid data: {}", id, e);
        ServiceError::validation(format!("exam {}: {}", id, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam::Difficulty;

    fn question(id: i64, letter: &str) -> Question {
        Question {
            id,
            exam_id: 1,
            question_text: format!("Question {}", id),
            option_a: "A".to_string(),
            option_b: "B".to_string(),
            option_c: "C".to_string(),
            option_d: "D".to_string(),
            correct_answer: letter.to_string(),
            explanation: None,
            topic: Some("algebra".to_string()),
            difficulty: None,
        }
    }

    fn exam_request(title: &str) -> CreateExamRequest {
        CreateExamRequest {
            title: title.to_string(),
            description: Some("desc".to_string()),
            subject: "Math".to_string(),
            difficulty: Difficulty::Medium,
            total_questions: 2,
            duration_minutes: 30,
        }
    }

    fn question_request(text: &str, letter: &str) -> CreateQuestionRequest {
        CreateQuestionRequest {
            question_text: text.to_string(),
            option_a: "1".to_string(),
            option_b: "2".to_string(),
            option_c: "3".to_string(),
            option_d: "4".to_string(),
            correct_answer: letter.to_string(),
            explanation: Some("because".to_string()),
            topic: None,
            difficulty: Some("easy".to_string()),
        }
    }

    #[test]
    fn test_answer_index_table() {
        assert_eq!(answer_index("a").unwrap(), 0);
        assert_eq!(answer_index("b").unwrap(), 1);
        assert_eq!(answer_index("C").unwrap(), 2);
        assert_eq!(answer_index("D").unwrap(), 3);
    }

    #[test]
    fn test_answer_index_rejects_out_of_set() {
        for bad in ["e", "", "ab", "1", " a", "z"] {
            assert!(
                matches!(answer_index(bad), Err(ServiceError::Validation(_))),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_format_for_delivery_projects_every_question() {
        let questions = vec![question(1, "a"), question(2, "B"), question(3, "d")];
        let delivered: Vec<DeliveredQuestion> = questions
            .iter()
            .map(format_for_delivery)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(delivered.len(), questions.len());
        assert_eq!(
            delivered.iter().map(|q| q.answer_index).collect::<Vec<_>>(),
            vec![0, 1, 3]
        );
        for q in &delivered {
            assert_eq!(q.options.len(), 4);
            assert!(q.answer_index <= 3);
        }
        assert_eq!(delivered[0].topic.as_deref(), Some("algebra"));
    }

    #[test]
    fn test_format_for_delivery_never_defaults_to_first_option() {
        let err = format_for_delivery(&question(9, "x")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_exams_filters_inactive_and_orders_by_title() {
        let db = Database::in_memory().await.unwrap();
        let catalog = ExamCatalog::new(&db);

        catalog.create_exam(&exam_request("Physics")).await.unwrap();
        let hidden = catalog.create_exam(&exam_request("Biology")).await.unwrap();
        catalog.create_exam(&exam_request("Algebra")).await.unwrap();
        sqlx::query("UPDATE exams SET is_active = 0 WHERE id = ?1")
            .bind(hidden)
            .execute(db.pool())
            .await
            .unwrap();

        let active: Vec<String> = catalog
            .list_exams(true)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(active, vec!["Algebra", "Physics"]);

        let all = catalog.list_exams(false).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].title, "Biology");
        assert!(!all[1].is_active);

        assert!(matches!(
            catalog.get_exam(hidden).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_question_and_deliver() {
        let db = Database::in_memory().await.unwrap();
        let catalog = ExamCatalog::new(&db);
        let exam_id = catalog.create_exam(&exam_request("Math-101")).await.unwrap();

        let q1 = catalog
            .add_question(exam_id, &question_request("1+1?", "B"))
            .await
            .unwrap();
        let q2 = catalog
            .add_question(exam_id, &question_request("2+2?", "d"))
            .await
            .unwrap();
        assert!(q1 < q2);

        let (exam, questions) = catalog.get_deliverable(exam_id).await.unwrap();
        assert_eq!(exam.title, "Math-101");
        assert_eq!(exam.difficulty, Difficulty::Medium);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].answer_index, 1);
        assert_eq!(questions[1].answer_index, 3);
        assert_eq!(questions[0].options[1], "2");
    }

    #[tokio::test]
    async fn test_add_question_validation() {
        let db = Database::in_memory().await.unwrap();
        let catalog = ExamCatalog::new(&db);
        let exam_id = catalog.create_exam(&exam_request("Math")).await.unwrap();

        let bad_letter = catalog
            .add_question(exam_id, &question_request("Q", "e"))
            .await;
        assert!(matches!(bad_letter, Err(ServiceError::Validation(_))));

        let empty_text = catalog.add_question(exam_id, &question_request("", "a")).await;
        assert!(matches!(empty_text, Err(ServiceError::Validation(_))));

        let missing_exam = catalog.add_question(999, &question_request("Q", "a")).await;
        assert!(matches!(missing_exam, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_corrupt_answer_key_fails_delivery() {
        let db = Database::in_memory().await.unwrap();
        let catalog = ExamCatalog::new(&db);
        let exam_id = catalog.create_exam(&exam_request("Broken")).await.unwrap();

        sqlx::query(
            r#"
            INSERT INTO question_pool
                (exam_id, question_text, option_a, option_b, option_c, option_d, correct_answer)
            VALUES (?1, 'Q', '1', '2', '3', '4', 'f')
            "#,
        )
        .bind(exam_id)
        .execute(db.pool())
        .await
        .unwrap();

        assert!(matches!(
            catalog.get_deliverable(exam_id).await,
            Err(ServiceError::Validation(_))
        ));
    }
}
