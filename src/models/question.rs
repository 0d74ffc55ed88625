// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Represents the 'question_pool' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Owning exam.
    pub exam_id: i64,

    pub question_text: String,

    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,

    /// Answer key as a single letter 'a'..'d' (any case).
    pub correct_answer: String,

    pub explanation: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<String>,
}

impl Question {
    /// The four options in display order.
    pub fn options(&self) -> [String; 4] {
        [
            self.option_a.clone(),
            self.option_b.clone(),
            self.option_c.clone(),
            self.option_d.clone(),
        ]
    }
}

/// Client-safe projection of a question.
/// The answer key is exposed as an index into `options`, never as the stored letter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveredQuestion {
    pub id: i64,
    pub text: String,
    pub options: [String; 4],
    pub answer_index: usize,
    pub explanation: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<String>,
}

/// DTO for adding a question to an exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: String,
    #[validate(length(min = 1, max = 500))]
    pub option_a: String,
    #[validate(length(min = 1, max = 500))]
    pub option_b: String,
    #[validate(length(min = 1, max = 500))]
    pub option_c: String,
    #[validate(length(min = 1, max = 500))]
    pub option_d: String,
    #[validate(custom(function = validate_answer_letter))]
    pub correct_answer: String,
    #[validate(length(max = 4000))]
    pub explanation: Option<String>,
    #[validate(length(max = 100))]
    pub topic: Option<String>,
    #[validate(length(max = 20))]
    pub difficulty: Option<String>,
}

fn validate_answer_letter(letter: &str) -> Result<(), validator::ValidationError> {
    crate::services::catalog::answer_index(letter)
        .map(|_| ())
        .map_err(|_| validator::ValidationError::new("correct_answer_must_be_a_to_d"))
}
