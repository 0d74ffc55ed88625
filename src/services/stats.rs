// src/services/stats.rs

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::{
    db::Database,
    models::stats::{SubjectStats, UserStats},
    services::error::ServiceError,
};

/// Read-only aggregate views over the history tables.
#[derive(Clone, Debug)]
pub struct StatsAggregator {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct TotalsRow {
    total_exams: i64,
    total_score: i64,
    total_questions: i64,
    total_time_spent: i64,
}

#[derive(FromRow)]
struct SubjectRow {
    exam_type: String,
    exam_count: i64,
    total_score: i64,
    total_questions: i64,
}

/// `100 * score / questions`, or 0 when there are no questions to divide by.
pub fn percentage(score: i64, questions: i64) -> f64 {
    if questions <= 0 {
        return 0.0;
    }
    100.0 * score as f64 / questions as f64
}

impl StatsAggregator {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Totals across every record of the user.
    ///
    /// A user without records, or whose records hold no questions at all, gets all zeros.
    pub async fn user_stats(&self, user_id: i64) -> Result<UserStats, ServiceError> {
        let totals = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT
                COUNT(*) AS total_exams,
                COALESCE(SUM(score), 0) AS total_score,
                COALESCE(SUM(total_questions), 0) AS total_questions,
                COALESCE(SUM(time_spent), 0) AS total_time_spent
            FROM history_records
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        if totals.total_exams == 0 || totals.total_questions == 0 {
            return Ok(UserStats::default());
        }

        // Read from the column itself so the declared DATETIME type drives decoding.
        let last_exam_date: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT completed_at
            FROM history_records
            WHERE user_id = ?1
            ORDER BY completed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(UserStats {
            total_exams: totals.total_exams,
            total_score: totals.total_score,
            total_questions: totals.total_questions,
            average_score: percentage(totals.total_score, totals.total_questions),
            total_time_spent: totals.total_time_spent,
            last_exam_date,
        })
    }

    /// Per-label breakdown, most attempted label first.
    pub async fn stats_by_subject(&self, user_id: i64) -> Result<Vec<SubjectStats>, ServiceError> {
        let rows = sqlx::query_as::<_, SubjectRow>(
            r#"
            SELECT
                exam_type,
                COUNT(*) AS exam_count,
                COALESCE(SUM(score), 0) AS total_score,
                COALESCE(SUM(total_questions), 0) AS total_questions
            FROM history_records
            WHERE user_id = ?1
            GROUP BY exam_type
            ORDER BY exam_count DESC, exam_type ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SubjectStats {
                average_score: percentage(row.total_score, row.total_questions),
                exam_type: row.exam_type,
                exam_count: row.exam_count,
                total_score: row.total_score,
                total_questions: row.total_questions,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::history::NewHistoryRecord,
        services::history::{HistoryStore, tests::insert_user},
    };

    async fn record(store: &HistoryStore, user_id: i64, label: &str, score: i64, total: i64, time: i64) {
        store
            .save(&NewHistoryRecord {
                user_id,
                exam_type: label.to_string(),
                score,
                total_questions: total,
                time_spent: time,
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_percentage_guards_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(3, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(2, 2), 100.0);
    }

    #[tokio::test]
    async fn test_user_stats_without_records_is_zeroed() {
        let db = Database::in_memory().await.unwrap();
        let stats = StatsAggregator::new(&db);
        let user = insert_user(&db, "empty").await;

        let result = stats.user_stats(user).await.unwrap();
        assert_eq!(
            result,
            UserStats {
                total_exams: 0,
                total_score: 0,
                total_questions: 0,
                average_score: 0.0,
                total_time_spent: 0,
                last_exam_date: None,
            }
        );
        assert!(!result.average_score.is_nan());
        assert!(stats.stats_by_subject(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_stats_sums_and_ratio() {
        let db = Database::in_memory().await.unwrap();
        let store = HistoryStore::new(&db);
        let stats = StatsAggregator::new(&db);
        let user = insert_user(&db, "busy").await;
        let other = insert_user(&db, "bystander").await;

        record(&store, user, "Math", 3, 4, 60).await;
        record(&store, user, "Math", 1, 4, 30).await;
        record(&store, user, "Physics", 2, 2, 15).await;
        record(&store, other, "Math", 0, 10, 100).await;

        let result = stats.user_stats(user).await.unwrap();
        assert_eq!(result.total_exams, 3);
        assert_eq!(result.total_score, 6);
        assert_eq!(result.total_questions, 10);
        assert_eq!(result.total_time_spent, 105);
        assert_eq!(result.average_score, 60.0);
        assert!(result.last_exam_date.is_some());

        let latest = store.find_by_user_id(user).await.unwrap()[0].completed_at;
        assert_eq!(result.last_exam_date, Some(latest));
    }

    #[tokio::test]
    async fn test_user_stats_without_questions_is_zeroed() {
        let db = Database::in_memory().await.unwrap();
        let store = HistoryStore::new(&db);
        let stats = StatsAggregator::new(&db);
        let user = insert_user(&db, "blank").await;

        record(&store, user, "Empty", 0, 0, 45).await;

        assert_eq!(stats.user_stats(user).await.unwrap(), UserStats::default());
    }

    #[tokio::test]
    async fn test_stats_by_subject_groups_and_orders() {
        let db = Database::in_memory().await.unwrap();
        let store = HistoryStore::new(&db);
        let stats = StatsAggregator::new(&db);
        let user = insert_user(&db, "grouped").await;

        record(&store, user, "Physics", 1, 2, 10).await;
        record(&store, user, "Math", 2, 4, 10).await;
        record(&store, user, "Math", 4, 4, 10).await;
        record(&store, user, "Empty", 0, 0, 0).await;

        let groups = stats.stats_by_subject(user).await.unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].exam_type, "Math");
        assert_eq!(groups[0].exam_count, 2);
        assert_eq!(groups[0].total_score, 6);
        assert_eq!(groups[0].total_questions, 8);
        assert_eq!(groups[0].average_score, 75.0);

        let empty = groups.iter().find(|g| g.exam_type == "Empty").unwrap();
        assert_eq!(empty.average_score, 0.0);
        let physics = groups.iter().find(|g| g.exam_type == "Physics").unwrap();
        assert_eq!(physics.average_score, 50.0);
    }
}
