// src/models/exam.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::models::question::DeliveredQuestion;

/// Exam difficulty. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Raw row of the 'exams' table.
#[derive(Debug, FromRow)]
pub struct ExamRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub difficulty: String,
    pub total_questions: i64,
    pub duration_minutes: i64,
    pub is_active: bool,
}

/// Exam metadata. Exams are deactivated through `is_active`, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub difficulty: Difficulty,
    pub total_questions: i64,
    pub duration_minutes: i64,
    pub is_active: bool,
}

impl TryFrom<ExamRow> for Exam {
    type Error = String;

    fn try_from(row: ExamRow) -> Result<Self, Self::Error> {
        Ok(Exam {
            id: row.id,
            title: row.title,
            description: row.description,
            subject: row.subject,
            difficulty: row.difficulty.parse()?,
            total_questions: row.total_questions,
            duration_minutes: row.duration_minutes,
            is_active: row.is_active,
        })
    }
}

/// DTO for creating a new exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    pub difficulty: Difficulty,
    #[validate(range(min = 0, max = 1000))]
    #[serde(default)]
    pub total_questions: i64,
    #[validate(range(min = 0, max = 1440))]
    #[serde(default)]
    pub duration_minutes: i64,
}

/// Query parameters for listing exams.
#[derive(Debug, Default, Deserialize)]
pub struct ExamListParams {
    /// Lists inactive exams too when set.
    #[serde(default)]
    pub include_inactive: bool,
}

/// Exam with its deliverable question list.
#[derive(Debug, Serialize)]
pub struct ExamDetailResponse {
    #[serde(flatten)]
    pub exam: Exam,
    pub questions: Vec<DeliveredQuestion>,
}
