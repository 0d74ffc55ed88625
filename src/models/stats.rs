// src/models/stats.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregate performance of one user. Derived on demand, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserStats {
    pub total_exams: i64,
    pub total_score: i64,
    pub total_questions: i64,
    /// Percentage of correct answers over every question answered, 0 when undefined.
    pub average_score: f64,
    /// Seconds.
    pub total_time_spent: i64,
    pub last_exam_date: Option<DateTime<Utc>>,
}

/// Aggregate performance of one user on one exam label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectStats {
    pub exam_type: String,
    pub exam_count: i64,
    pub average_score: f64,
    pub total_score: i64,
    pub total_questions: i64,
}

/// Response body of the stats routes.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub user_id: i64,
    pub stats: UserStats,
    pub by_subject: Vec<SubjectStats>,
}
